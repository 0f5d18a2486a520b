use crate::{error::SkillSwapError, types::CounterKind};
use anyhow::Result;
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static FRAMES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_frames_received_total"));
pub static EVENTS_DISPATCHED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_events_dispatched_total"));
pub static HANDLER_FAILURES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_handler_failures_total"));
pub static NOTIFICATIONS_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_notifications_total"));
pub static BROADCASTS_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_platform_broadcasts_total"));
pub static REFRESHES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_counter_refreshes_total"));
pub static REFRESH_FAILURES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_counter_refresh_failures_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("skillswap_reconnects_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("skillswap_connected"));
pub static PENDING_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("skillswap_pending_requests"));
pub static ACTIVE_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("skillswap_active_swaps"));

pub fn counter_gauge(kind: CounterKind) -> &'static Gauge {
    match kind {
        CounterKind::Pending => &*PENDING_GAUGE,
        CounterKind::Active => &*ACTIVE_GAUGE,
    }
}

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "skillswap-live")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(()) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            // Initialize metrics with default values
            FRAMES_RECEIVED_COUNTER.absolute(0);
            EVENTS_DISPATCHED_COUNTER.absolute(0);
            NOTIFICATIONS_COUNTER.absolute(0);
            REFRESHES_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(SkillSwapError::MetricsError(e.to_string()).into())
        }
    }
}
