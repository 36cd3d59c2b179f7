//! Configuration management
//!
//! Settings are resolved in this order (later wins):
//! 1. Built-in defaults
//! 2. `wa-relay.toml` (or the file named by `WA_RELAY_CONFIG`)
//! 3. Environment variables
//!
//! `${VAR_NAME}` inside the TOML file is replaced with the environment value.
//! The resulting [`Config`] is immutable and shared by every request.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "wa-relay.toml";

/// System instruction sent with every generation call unless overridden
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a concise, helpful assistant for WhatsApp. Be friendly and answer clearly.";

/// Text-generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Groq chat completions (OpenAI-compatible)
    #[default]
    Groq,
    /// Google Gemini generateContent
    Gemini,
}

impl LlmProvider {
    /// Parse a provider name as written in config or `LLM_PROVIDER`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "openai/gpt-oss-20b",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WhatsApp Cloud API settings
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Graph API access token (`WHATSAPP_TOKEN`)
    pub access_token: String,

    /// Sender phone number id (`PHONE_NUMBER_ID`)
    pub phone_number_id: String,

    /// Shared secret for the verification handshake (`VERIFY_TOKEN`)
    pub verify_token: Option<String>,

    /// Graph API version segment, e.g. `v21.0`
    pub graph_api_version: String,

    /// Graph API origin, without version
    pub graph_base_url: String,

    /// Fixed reply for messages that carry no text (images, stickers, ...).
    /// Unset means such messages are skipped silently.
    pub unsupported_message_reply: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: None,
            graph_api_version: default_graph_api_version(),
            graph_base_url: default_graph_base_url(),
            unsupported_message_reply: None,
        }
    }
}

impl fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("access_token", &mask_secret(&self.access_token))
            .field("phone_number_id", &self.phone_number_id)
            .field(
                "verify_token",
                &mask_secret(self.verify_token.as_deref().unwrap_or_default()),
            )
            .field("graph_api_version", &self.graph_api_version)
            .field("graph_base_url", &self.graph_base_url)
            .field("unsupported_message_reply", &self.unsupported_message_reply)
            .finish()
    }
}

/// Text-generation settings
#[derive(Clone, Default)]
pub struct LlmConfig {
    pub provider: LlmProvider,

    /// API key; `None` puts the relay in echo mode
    pub api_key: Option<String>,

    /// Model override (provider default otherwise)
    pub model: Option<String>,

    /// Endpoint override (provider default otherwise)
    pub base_url: Option<String>,

    /// System instruction override
    pub system_prompt: Option<String>,
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Whether a provider call will be made at all
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field(
                "api_key",
                &mask_secret(self.api_key.as_deref().unwrap_or_default()),
            )
            .field("model", &self.model())
            .field("base_url", &self.base_url())
            .field("system_prompt", &self.system_prompt())
            .finish()
    }
}

/// Listen address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Main configuration, built once at startup
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

fn default_graph_api_version() -> String {
    "v21.0".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn mask_secret(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Load configuration from the default locations
    ///
    /// Uses `$WA_RELAY_CONFIG` if set, then `./wa-relay.toml` if present,
    /// otherwise environment variables only.
    pub fn load() -> Result<Self> {
        if let Some(path) = process_env("WA_RELAY_CONFIG").filter(|p| !p.is_empty()) {
            return Self::from_toml_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load a TOML file, then overlay environment variables
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content, process_env)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    /// Build from an arbitrary variable source (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_toml_config(TomlConfig::default(), lookup)
    }

    /// Parse TOML text, expanding `${VAR}` and overlaying variables from `lookup`
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, &lookup);
        let toml: TomlConfig = toml::from_str(&expanded)?;
        Self::from_toml_config(toml, lookup)
    }

    fn from_toml_config<F>(toml: TomlConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let wa = toml.whatsapp.unwrap_or_default();
        let whatsapp = WhatsAppConfig {
            access_token: var("WHATSAPP_TOKEN")
                .or(wa.access_token)
                .unwrap_or_default(),
            phone_number_id: var("PHONE_NUMBER_ID")
                .or(wa.phone_number_id)
                .unwrap_or_default(),
            verify_token: var("VERIFY_TOKEN").or(non_empty(wa.verify_token)),
            graph_api_version: var("GRAPH_API_VERSION")
                .or(wa.graph_api_version)
                .unwrap_or_else(default_graph_api_version),
            graph_base_url: var("GRAPH_BASE_URL")
                .or(wa.graph_base_url)
                .unwrap_or_else(default_graph_base_url),
            unsupported_message_reply: var("UNSUPPORTED_MESSAGE_REPLY")
                .or(non_empty(wa.unsupported_message_reply)),
        };

        let llm = toml.llm.unwrap_or_default();
        let explicit = match var("LLM_PROVIDER").or(non_empty(llm.provider)) {
            Some(name) => Some(
                LlmProvider::parse(&name)
                    .ok_or_else(|| Error::Config(format!("Unknown LLM provider: {}", name)))?,
            ),
            None => None,
        };

        // Without an explicit choice the first provider with a key wins
        let provider = explicit.unwrap_or_else(|| {
            if var(LlmProvider::Groq.api_key_env()).is_some() {
                LlmProvider::Groq
            } else if var(LlmProvider::Gemini.api_key_env()).is_some() {
                LlmProvider::Gemini
            } else {
                LlmProvider::default()
            }
        });

        let llm = LlmConfig {
            provider,
            api_key: var(provider.api_key_env()).or(non_empty(llm.api_key)),
            model: var("LLM_MODEL").or(non_empty(llm.model)),
            base_url: var("LLM_BASE_URL").or(non_empty(llm.base_url)),
            system_prompt: var("SYSTEM_PROMPT").or(non_empty(llm.system_prompt)),
        };

        let srv = toml.server.unwrap_or_default();
        let server = ServerConfig {
            host: var("HOST").or(srv.host).unwrap_or_else(default_host),
            port: var("PORT")
                .and_then(|p| p.trim().parse().ok())
                .or(srv.port)
                .unwrap_or_else(default_port),
        };

        Ok(Config {
            whatsapp,
            llm,
            server,
        })
    }

    /// Settings that are missing but do not prevent startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.whatsapp.access_token.is_empty() {
            warnings.push("WHATSAPP_TOKEN is not set; replies cannot be delivered".to_string());
        }
        if self.whatsapp.phone_number_id.is_empty() {
            warnings.push("PHONE_NUMBER_ID is not set; replies cannot be delivered".to_string());
        }
        if self.whatsapp.verify_token.is_none() {
            warnings.push("VERIFY_TOKEN is not set; webhook verification will be rejected".to_string());
        }
        if !self.llm.is_enabled() {
            warnings.push(format!(
                "{} missing; replies will fall back to echo",
                self.llm.provider.api_key_env()
            ));
        }

        warnings
    }

    /// Address the webhook server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Replace `${VAR_NAME}` with the variable's value (empty when unset)
fn expand_env_vars<F>(value: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }

            if let Some(env_value) = lookup(&var_name) {
                result.push_str(&env_value);
            }
        } else {
            result.push(c);
        }
    }

    result
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    whatsapp: Option<TomlWhatsAppConfig>,
    llm: Option<TomlLlmConfig>,
    server: Option<TomlServerConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    verify_token: Option<String>,
    graph_api_version: Option<String>,
    graph_base_url: Option<String>,
    unsupported_message_reply: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLlmConfig {
    /// "groq" or "gemini"
    provider: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
}
