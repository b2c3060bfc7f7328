// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ragline serve` command implementation.
//!
//! Builds the use-case graph over the configured providers and storage,
//! installs the Prometheus recorder, and runs the gateway until SIGTERM or
//! Ctrl+C.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use ragline_config::RaglineConfig;
use ragline_core::RaglineError;
use ragline_gateway::{AppState, Authenticator, ChunkGenerator, HealthState, MetricsRender};
use ragline_prometheus::PrometheusExporter;

use crate::app::{Collaborators, build_services};
use crate::shutdown;

fn metrics_render(config: &RaglineConfig) -> Option<MetricsRender> {
    if !config.metrics.enabled {
        info!("prometheus metrics disabled by configuration");
        return None;
    }
    match PrometheusExporter::install() {
        Ok(exporter) => {
            let render: MetricsRender = Arc::new(exporter.renderer());
            Some(render)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

/// Runs the `ragline serve` command.
pub async fn run_serve(config: RaglineConfig) -> Result<(), RaglineError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting ragline serve");

    let prometheus_render = metrics_render(&config);

    let collaborators = Collaborators::from_config(&config)?;
    let services = build_services(&config, collaborators).await?;

    let auth = Authenticator::from_config(&config.auth);
    if config.auth.bearer_token.is_none() && config.auth.api_keys.is_empty() {
        warn!("no bearer token or API keys configured; every API request will be rejected");
    }

    let generator = ChunkGenerator::new(config.streaming.chunk_bytes);
    info!(chunk_bytes = generator.chunk_bytes(), "sse framing configured");

    let shutdown = shutdown::install_signal_handler();
    let state = AppState {
        auth: Arc::new(auth),
        ingest: services.ingest,
        products: services.products,
        catalog: services.catalog,
        agents: services.agents,
        chat: services.chat,
        generator,
        frame_delay: Duration::from_millis(config.streaming.frame_delay_ms),
        health: HealthState {
            start_time: Instant::now(),
            storage: services.repositories.health.clone(),
            prometheus_render,
        },
        shutdown: shutdown.clone(),
    };

    ragline_gateway::serve(&config.server, state, shutdown).await?;

    for (service, state) in services.breakers.snapshot() {
        info!(service = %service, state = ?state, "circuit breaker state at shutdown");
    }
    info!("ragline stopped");
    Ok(())
}
