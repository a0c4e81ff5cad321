use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vantage::cli::{Cli, Command, run_project, run_solve};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,vantage=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Project(args) => run_project(&args).map(|json| println!("{json}")),
        Command::Solve(args) => run_solve(&args).map(|json| println!("{json}")),
    };

    if let Err(e) = outcome {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn serve(args: vantage::cli::ServeArgs) -> Result<(), String> {
    let config = args.server_config()?;
    vantage::api::run_http_server(config)
        .await
        .map_err(|e| format!("Server error: {e}"))
}
