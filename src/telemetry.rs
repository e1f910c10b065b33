// src/telemetry.rs
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "olx_watcher=info,warn";

/// One-time metrics registration (so series show up once a recorder is installed).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "listing_pages_fetched_total",
            "Listing pages fetched by the walker."
        );
        describe_counter!(
            "listing_ads_collected_total",
            "Ads newer than the watermark."
        );
        describe_counter!("dispatch_delivered_total", "Ads delivered to the chat.");
        describe_counter!(
            "dispatch_rate_limited_total",
            "Deliveries that hit a rate limit."
        );
        describe_counter!("dispatch_cycle_errors_total", "Poll cycles that aborted.");
        describe_gauge!(
            "dispatch_watermark_ts",
            "Unix ts of the newest delivered ad refresh time."
        );
    });
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter and
/// `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // try_init: a second call (tests, probe tool) is a no-op.
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
