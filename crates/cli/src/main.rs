use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Book catalog service
#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service until Ctrl-C
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the resolved configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry);

    match cli.command {
        Command::Serve => bookshelf_app::app::serve(settings).await,
        Command::Migrate => {
            let applied = bookshelf_app::app::migrate(settings).await?;
            tracing::info!(applied, "migrations applied");
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}
