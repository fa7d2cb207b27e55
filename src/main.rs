use anyhow::Context;
use clap::Parser;
use figment::{Figment, providers::Env};
use std::process::ExitCode;
use tracing::info;

use breakoutglobe::app::App;
use breakoutglobe::cli::{Args, ServiceName};
use breakoutglobe::config::Config;
use breakoutglobe::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config: Config = match Figment::new()
        .merge(Env::raw())
        .extract()
        .context("Failed to load config")
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting breakoutglobe"
    );

    let mut app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = ?e, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.setup_services(&ServiceName::all()) {
        tracing::error!(error = ?e, "failed to set up services");
        return ExitCode::FAILURE;
    }

    app.start_services();
    app.run().await
}
