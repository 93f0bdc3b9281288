//! hlswatch daemon entry point.
//!
//! Wires the conversion pipeline from `hlswatch-core` to the real ffmpeg
//! transcoder and a static file server, then waits for the first fatal
//! condition or a shutdown signal.

mod config;
mod http;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hlswatch_core::pipeline::{self, PipelineConfig};
use hlswatch_core::worker::FfmpegTranscoder;

use crate::config::{Args, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set variables directly.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Quieter defaults; override via RUST_LOG.
                "info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::resolve(args).context("invalid configuration")?;
    info!(
        source = %config.source_dir.display(),
        dest = %config.dest_dir.display(),
        port = config.port,
        "starting hlswatch"
    );

    let mut handle = pipeline::start(
        PipelineConfig::new(config.source_dir.clone(), config.dest_dir.clone()),
        Arc::new(FfmpegTranscoder::new()),
    )
    .await
    .context("failed to start conversion pipeline")?;

    let shutdown = handle.cancellation_token();
    let server = tokio::spawn(http::serve(
        config.bind_addr(),
        config.dest_dir.clone(),
        shutdown.clone(),
    ));

    let result = tokio::select! {
        fatal = handle.wait_fatal() => {
            error!(error = %fatal, "pipeline failed");
            Err(anyhow::Error::new(fatal).context("pipeline failed"))
        }
        served = server => match served {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                error!(error = %err, "http server failed");
                Err(anyhow::Error::new(err).context("http server failed"))
            }
            Err(join_err) => Err(anyhow::anyhow!("http server task panicked: {join_err}")),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    // Cooperative shutdown: bounded by the longest in-flight transcode.
    handle.shutdown().await;

    result
}
