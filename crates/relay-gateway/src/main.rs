//! wa-relay: WhatsApp to LLM webhook relay
//!
//! Usage:
//!   wa-relay                 - Start the webhook server
//!   wa-relay --check-config  - Print the resolved configuration and exit
//!   wa-relay --help          - Show help

use relay_core::Config;
use relay_whatsapp::WhatsAppBot;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Serve the webhook
    Server,
    /// Load configuration, report it, exit
    CheckConfig,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args(std::env::args().skip(1));

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("wa-relay {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    if mode == RunMode::CheckConfig {
        println!("{:#?}", config);
        return Ok(());
    }

    run_server(config).await
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> RunMode
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.as_str() {
            "--check-config" => return RunMode::CheckConfig,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("wa-relay - WhatsApp webhook relay to an LLM");
    println!();
    println!("Usage:");
    println!("  wa-relay                 Start the webhook server");
    println!("  wa-relay --check-config  Print the resolved configuration and exit");
    println!("  wa-relay --help          Show this help message");
    println!("  wa-relay --version       Show version");
    println!();
    println!("Environment Variables:");
    println!("  WHATSAPP_TOKEN             Graph API access token");
    println!("  PHONE_NUMBER_ID            Sender phone number id");
    println!("  VERIFY_TOKEN               Webhook verification secret");
    println!("  LLM_PROVIDER               groq or gemini (default: detected from key)");
    println!("  GROQ_API_KEY               Groq API key");
    println!("  GOOGLE_API_KEY             Google Gemini API key");
    println!("  LLM_MODEL                  Model override");
    println!("  SYSTEM_PROMPT              System instruction override");
    println!("  UNSUPPORTED_MESSAGE_REPLY  Reply sent for non-text messages (default: none)");
    println!("  HOST                       Listen host (default: 0.0.0.0)");
    println!("  PORT                       Listen port (default: 5000)");
    println!("  WA_RELAY_CONFIG            Path to a TOML config file (default: ./wa-relay.toml)");
    println!();
    println!("Without an API key, replies fall back to \"Echo: <message>\".");
}

/// Run the webhook server until Ctrl+C
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting wa-relay...");

    let bot = WhatsAppBot::new(&config);
    tracing::info!("Reply mode: {}", bot.handler().reply_mode());
    tracing::info!("Webhook endpoint: http://{}/webhook", bot.addr());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down...");
    };

    bot.start(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Webhook server error: {}", e))?;

    tracing::info!("Shutdown complete");
    Ok(())
}
