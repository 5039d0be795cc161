use crate::storage::StoreMetrics;
use anyhow::Result;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

pub type LogHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Initialize JSON logging with reloadable level.
pub fn init_tracing(log_level: Option<&str>) -> Result<LogHandle> {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {e}"))?;
    Ok(handle)
}

/// Swap the active filter, e.g. `"debug"` or `"quantum_retained=trace"`.
pub fn set_log_level(handle: &LogHandle, level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).map_err(|e| anyhow::anyhow!("invalid log level {level}: {e}"))?;
    handle
        .modify(|f| *f = filter)
        .map_err(|e| anyhow::anyhow!("failed to reload log filter: {e}"))?;
    tracing::info!(level, "log level changed");
    Ok(())
}

/// Render store metrics in Prometheus text format.
pub fn render_metrics(provider: &str, metrics: &StoreMetrics) -> String {
    let mut body = String::new();
    let rows: [(&str, u64); 9] = [
        ("retained_entries", metrics.entry_count as u64),
        ("retained_bytes", metrics.total_bytes),
        ("retained_stored_total", metrics.stored),
        ("retained_evicted_total", metrics.evicted),
        ("retained_expired_total", metrics.expired),
        ("retained_lookups_total", metrics.lookups),
        ("retained_remote_frames_total", metrics.remote_frames),
        ("retained_malformed_frames_total", metrics.malformed_frames),
        ("retained_rejected_requests_total", metrics.rejected_requests),
    ];
    for (name, value) in rows {
        body.push_str(&format!("{}{{provider=\"{}\"}} {}\n", name, provider, value));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_metric() {
        let metrics = StoreMetrics {
            entry_count: 3,
            total_bytes: 42,
            evicted: 7,
            ..StoreMetrics::default()
        };
        let body = render_metrics("inmemory", &metrics);
        assert_eq!(body.lines().count(), 9);
        assert!(body.contains("retained_entries{provider=\"inmemory\"} 3\n"));
        assert!(body.contains("retained_bytes{provider=\"inmemory\"} 42\n"));
        assert!(body.contains("retained_evicted_total{provider=\"inmemory\"} 7\n"));
        assert!(body.contains("retained_lookups_total{provider=\"inmemory\"} 0\n"));
    }

    #[test]
    fn reloads_level_and_rejects_garbage() {
        let handle = init_tracing(Some("warn")).expect("first init");
        assert!(init_tracing(None).is_err());
        set_log_level(&handle, "debug").unwrap();
        assert!(set_log_level(&handle, "quantum_retained=loud").is_err());
    }
}
