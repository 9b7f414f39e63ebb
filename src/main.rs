use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mediaq::backend::PlatformBackend;
use mediaq::controller::Controller;
use mediaq::controller::deadline::{COMMAND_DEADLINE, with_deadline};
use mediaq::error::{CommandError, ControlError};
use mediaq::session::CommandKind;

#[derive(Parser)]
#[command(name = "mediaq", version, about = "Query and control media playback sessions")]
struct Cli {
    /// Overall command deadline in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = COMMAND_DEADLINE.as_millis() as u64)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List currently playing sessions
    Now {
        /// Collapse sessions reporting the same title and artist
        #[arg(long)]
        distinct: bool,
    },
    /// Toggle playback and print the resulting session state
    Toggle { source: Option<String> },
    /// Skip to the next track and print the resulting session state
    Next { source: Option<String> },
    /// Go back to the previous track and print the resulting session state
    Previous { source: Option<String> },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = CommandError::from(&err);
            let json = serde_json::to_string(&report)
                .unwrap_or_else(|_| format!("{{\"message\":{:?}}}", report.message));
            eprintln!("{json}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ControlError> {
    let deadline = Duration::from_millis(cli.timeout);
    let backend = PlatformBackend::connect().await?;
    let controller = Controller::new(backend);

    match cli.command {
        Command::Now { distinct } => {
            let sessions =
                with_deadline(deadline, controller.playing_sessions(distinct)).await?;
            print_json(&sessions)
        }
        Command::Toggle { source } => {
            transport(&controller, deadline, source, CommandKind::Toggle).await
        }
        Command::Next { source } => {
            transport(&controller, deadline, source, CommandKind::Next).await
        }
        Command::Previous { source } => {
            transport(&controller, deadline, source, CommandKind::Previous).await
        }
    }
}

async fn transport(
    controller: &Controller<PlatformBackend>,
    deadline: Duration,
    source: Option<String>,
    command: CommandKind,
) -> Result<(), ControlError> {
    let snapshot = with_deadline(deadline, controller.transport(source.as_deref(), command)).await?;
    print_json(&snapshot.session)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ControlError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
