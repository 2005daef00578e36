use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;

use cli::{Cli, Commands};
use context::CliContext;

#[tokio::main]
async fn main() -> Result<()> {
    let _file_guard = init_tracing();

    let cli = Cli::parse();
    let format = cli.format;

    match dispatch(cli).await {
        Ok(()) => Ok(()),
        Err(error) => {
            match format {
                gobby_core::OutputFormat::Json => {
                    println!("{}", serde_json::json!({"error": error.to_string()}));
                }
                gobby_core::OutputFormat::Text => eprintln!("error: {error}"),
            }
            std::process::exit(error.exit_code());
        }
    }
}

/// stderr for interactive feedback, plus a daily-rolling file under
/// `~/.gobby/logs/` so a backgrounded daemon's history survives past
/// its terminal. The returned guard must stay alive for the process's
/// lifetime or the file writer drops buffered lines on exit.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = gobby_core::config::gobby_home().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "gobby.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok();

    guard
}

async fn dispatch(cli: Cli) -> Result<(), gobby_core::GobbyError> {
    let ctx = CliContext::load(cli.cd, cli.format).map_err(|e| gobby_core::GobbyError::Internal(e.to_string()))?;
    match cli.command {
        Commands::Start { bind, port, foreground } => commands::daemon::handle_start(&ctx, bind, port, foreground).await,
        Commands::Stop => commands::daemon::handle_stop(&ctx),
        Commands::Status => commands::daemon::handle_status(&ctx),
        Commands::Tasks { cmd } => commands::tasks::handle(&ctx, cmd).await,
        Commands::Sessions { cmd } => commands::sessions::handle(&ctx, cmd),
        Commands::Workflows { cmd } => commands::workflows::handle(&ctx, cmd),
        Commands::Agents { cmd } => commands::agents::handle(&ctx, cmd).await,
        Commands::Worktrees { cmd } => commands::worktrees::handle(&ctx, cmd).await,
        Commands::Clones { cmd } => commands::clones::handle(&ctx, cmd).await,
        Commands::Conductor { cmd } => commands::conductor::handle(&ctx, cmd),
        Commands::Projects { cmd } => commands::projects::handle(&ctx, cmd),
    }
}
