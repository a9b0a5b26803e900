//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. Vault activity
//! counters are driven by [`MetricsSink`], which the node registers on the
//! engine as an event sink; rejections are recorded by the API layer.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use synthex_protocol::{EventRecord, EventSink, VaultEvent};

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    pub vaults_created_total: IntCounter,
    pub collateral_added_total: IntCounter,
    pub collateral_removed_total: IntCounter,
    pub tokens_minted_total: IntCounter,
    pub tokens_burned_total: IntCounter,
    /// Administrative changes, by event kind.
    pub admin_changes_total: IntCounterVec,
    /// Rejected engine operations, by error code.
    pub rejected_operations_total: IntCounterVec,
    /// Number of vaults in the registry.
    pub vault_count: IntGauge,
    /// Wall-clock latency of mutating API calls, including queueing.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("synthex".into()), None)
            .expect("failed to create prometheus registry");

        let counter = |name: &str, help: &str| {
            let metric = IntCounter::new(name, help).expect("metric creation");
            registry
                .register(Box::new(metric.clone()))
                .expect("metric registration");
            metric
        };
        let vaults_created_total = counter("vaults_created_total", "Vaults opened");
        let collateral_added_total =
            counter("collateral_added_total", "Successful collateral deposits");
        let collateral_removed_total =
            counter("collateral_removed_total", "Successful collateral withdrawals");
        let tokens_minted_total = counter("tokens_minted_total", "Successful mint operations");
        let tokens_burned_total = counter("tokens_burned_total", "Successful burn operations");

        let admin_changes_total = IntCounterVec::new(
            Opts::new("admin_changes_total", "Administrative changes applied"),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(admin_changes_total.clone()))
            .expect("metric registration");

        let rejected_operations_total = IntCounterVec::new(
            Opts::new("rejected_operations_total", "Engine operations rejected"),
            &["code"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejected_operations_total.clone()))
            .expect("metric registration");

        let vault_count =
            IntGauge::new("vault_count", "Vaults in the registry").expect("metric creation");
        registry
            .register(Box::new(vault_count.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of mutating API calls in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            vaults_created_total,
            collateral_added_total,
            collateral_removed_total,
            tokens_minted_total,
            tokens_burned_total,
            admin_changes_total,
            rejected_operations_total,
            vault_count,
            operation_latency_seconds,
        }
    }

    /// Records one engine event.
    pub fn observe(&self, event: &VaultEvent) {
        match event {
            VaultEvent::VaultCreated { .. } => {
                self.vaults_created_total.inc();
                self.vault_count.inc();
            }
            VaultEvent::CollateralAdded { .. } => self.collateral_added_total.inc(),
            VaultEvent::CollateralRemoved { .. } => self.collateral_removed_total.inc(),
            VaultEvent::TokensMinted { .. } => self.tokens_minted_total.inc(),
            VaultEvent::TokensBurned { .. } => self.tokens_burned_total.inc(),
            other => self
                .admin_changes_total
                .with_label_values(&[other.kind()])
                .inc(),
        }
    }

    /// Records one rejected operation.
    pub fn reject(&self, code: &str) {
        self.rejected_operations_total
            .with_label_values(&[code])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Feeds engine events into [`NodeMetrics`].
pub struct MetricsSink {
    metrics: SharedMetrics,
}

impl MetricsSink {
    pub fn new(metrics: SharedMetrics) -> Self {
        Self { metrics }
    }
}

impl EventSink for MetricsSink {
    fn publish(&self, record: &EventRecord) {
        self.metrics.observe(&record.event);
    }
}

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
