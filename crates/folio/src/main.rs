//! Folio CLI - session orchestration from the command line
//!
//! Binary name: `folio`

use std::process;

mod cli;
mod handlers;

use anyhow::Result;
use handlers::format_error;

async fn run_cli() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    match matches.subcommand() {
        Some(("documents", sub_m)) => handlers::handle_documents(sub_m),
        Some(("mode", sub_m)) => handlers::handle_mode(sub_m),
        Some(("bundle", sub_m)) => handlers::handle_bundle(sub_m).await,
        Some((other, _)) => Err(anyhow::anyhow!("Unknown command: {other}")),
        None => Err(anyhow::anyhow!("No command given")),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_cli().await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {}", format_error(&err));
        }

        let code = err
            .downcast_ref::<folio_orchestrator::Error>()
            .map_or(1, folio_orchestrator::Error::exit_code);

        #[allow(clippy::exit)]
        process::exit(code);
    }
}
