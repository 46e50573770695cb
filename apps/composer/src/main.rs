use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use composer::config::Config;
use composer::llm_client::LlmClient;
use composer::protocol::{GenerationRecord, RetryController, TurnContext, TurnRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting composer v{}", env!("CARGO_PKG_VERSION"));

    let protocol = config.protocol()?;
    info!(
        "Protocol v{} (delimiter {:?}, language {}, max retries {})",
        protocol.version, protocol.delimiter, protocol.language, protocol.max_retries
    );

    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_model.clone(),
        config.llm_max_tokens,
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let message = read_message()?;
    let context = TurnContext::default();
    let request = TurnRequest {
        message: &message,
        history: &[],
        context: &context,
        current_article: None,
    };

    let result = RetryController::new(&llm, &protocol).run(request).await;
    let composed = match result.and_then(|c| c.turn.clone().require_compliant().map(|_| c)) {
        Ok(composed) => composed,
        Err(e) => {
            println!("{}", e.user_message(&protocol));
            std::process::exit(1);
        }
    };

    let record = GenerationRecord::from_composed(&composed, None);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Message from the command line, or stdin when no argument is given.
fn read_message() -> Result<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let message = if args.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read message from stdin")?;
        buf
    } else {
        args.join(" ")
    };

    if message.trim().is_empty() {
        bail!("Usage: composer \"<message>\" (or pipe the message on stdin)");
    }
    Ok(message)
}

