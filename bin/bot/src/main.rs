use sidekick_bot::{Bot, BotConfig, BotError, ConsoleGateway};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "sidekick stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BotError> {
    let config = BotConfig::from_env()?;
    tracing::info!("Loaded configuration");

    let gateway = Arc::new(ConsoleGateway::new(
        tokio::io::stdout(),
        config.gateway.max_message_chars,
    ));
    let bot = Arc::new(Bot::from_config(&config, gateway)?);

    // Periodic background check
    let heartbeat = bot.spawn_heartbeat(config.polling.background_interval());

    tracing::info!("reading 'channel: text' lines from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let bot = Arc::clone(&bot);
                    tokio::spawn(async move { bot.handle_line(&line).await });
                }
                None => {
                    tracing::info!("stdin closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    heartbeat.abort();
    Ok(())
}
