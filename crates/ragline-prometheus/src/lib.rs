// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exposition for Ragline metrics.
//!
//! Crates record through the `metrics` facade; this crate installs the
//! process-wide Prometheus recorder and renders its text format for the
//! gateway's `/metrics` endpoint.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use ragline_core::RaglineError;

pub use recording::register_metrics;

/// Installed Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl std::fmt::Debug for PrometheusExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusExporter").finish_non_exhaustive()
    }
}

impl PrometheusExporter {
    /// Installs the recorder globally and registers metric descriptions.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, RaglineError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            RaglineError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// A `Send + Sync` closure rendering the current exposition.
    pub fn renderer(&self) -> impl Fn() -> String + Send + Sync + 'static {
        let handle = self.handle.clone();
        move || handle.render()
    }
}
