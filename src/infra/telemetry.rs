//! Process-wide log subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Dependencies whose debug output drowns out request logs.
const QUIET_TARGETS: [&str; 3] = ["sqlx::query=warn", "hyper_util=info", "reqwest=info"];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` directives win over the
/// configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    DESCRIBED.call_once(describe_metrics);

    let layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter(logging))
        .with(ErrorLayer::default())
        .with(layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn filter(logging: &LoggingSettings) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    for directive in QUIET_TARGETS {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn describe_metrics() {
    describe_histogram!(
        "todolist_http_request_ms",
        Unit::Milliseconds,
        "Time from request arrival to response, by status."
    );
    describe_counter!(
        "todolist_http_rate_limited_total",
        Unit::Count,
        "API requests answered with 429."
    );
    describe_counter!(
        "todolist_auth_rejected_total",
        Unit::Count,
        "API requests rejected for a missing, invalid or orphaned token."
    );
    crate::offline::describe_metrics();
}
