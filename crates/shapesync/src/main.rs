mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

const LOG_FILE_PREFIX: &str = "shapesync.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Flushes the file appender on exit
    let _guard = match init_tracing(&cli.global) {
        Ok(guard) => guard,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    };

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        tracing::error!(error = %err, "shapesync exiting");
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn init_tracing(global: &GlobalOpts) -> Result<Option<WorkerGuard>, CliError> {
    let filter = match global.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match global.log_format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    });

    let guard = match &global.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    Ok(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run => commands::run::handle(&cli.global).await,
        Command::Once => commands::once::handle(&cli.global).await,
        Command::Check => commands::check::handle(&cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "shapesync", &mut std::io::stdout());
            Ok(())
        }
    }
}
