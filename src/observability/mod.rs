//! Observability for shardbase
//!
//! Structured JSON-line logging of typed events plus per-accessor counters.
//! Observability is read-only: it never changes the outcome of an
//! operation, and a failed log write is ignored.
//!
//! ```ignore
//! use shardbase::observability::{log_event, Event};
//!
//! log_event(Event::ConnectionOpened, &[("db", "shard_a"), ("role", "primary")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{AccessorMetrics, MetricsSnapshot};

/// Logs an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
