//! Observable events
//!
//! Every log line the crate emits names one of these events.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Credentials or table configs read from disk
    ConfigLoaded,
    /// Partition rules compiled into a slot table
    ShardMapBuilt,
    /// Entity bound in the registry
    EntityRegistered,
    /// First use of a (database, role) slot connected
    ConnectionOpened,
    /// Connect attempt failed
    ConnectionFailed,
    /// Write statement refused on a replica
    ReplicaWriteRejected,
    /// Statement raised an engine error
    ExecutionFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ShardMapBuilt => "SHARD_MAP_BUILT",
            Event::EntityRegistered => "ENTITY_REGISTERED",
            Event::ConnectionOpened => "CONNECTION_OPENED",
            Event::ConnectionFailed => "CONNECTION_FAILED",
            Event::ReplicaWriteRejected => "REPLICA_WRITE_REJECTED",
            Event::ExecutionFailed => "EXECUTION_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ConfigLoaded
            | Event::ShardMapBuilt
            | Event::EntityRegistered
            | Event::ConnectionOpened => Severity::Info,
            Event::ReplicaWriteRejected => Severity::Warn,
            Event::ConnectionFailed | Event::ExecutionFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_errors() {
        assert_eq!(Event::ConnectionFailed.severity(), Severity::Error);
        assert_eq!(Event::ExecutionFailed.severity(), Severity::Error);
        assert_eq!(Event::ReplicaWriteRejected.severity(), Severity::Warn);
        assert_eq!(Event::ConnectionOpened.severity(), Severity::Info);
    }

    #[test]
    fn test_names_are_screaming_snake_case() {
        for event in [
            Event::ConfigLoaded,
            Event::ShardMapBuilt,
            Event::EntityRegistered,
            Event::ConnectionOpened,
            Event::ConnectionFailed,
            Event::ReplicaWriteRejected,
            Event::ExecutionFailed,
        ] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{}", name);
        }
    }
}
