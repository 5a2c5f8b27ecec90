//! Logging setup for dependency-resolver
//!
//! Resolution events are emitted with `tracing` under the
//! `dependency_resolver` target: definitions and container lifecycle at
//! DEBUG, every `make`, memoized signature and invocation at TRACE. This
//! module installs a `tracing-subscriber` to print them.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber output
//! - `logging-pretty` - multi-line human-readable subscriber output
//!
//! # Example
//!
//! ```rust,ignore
//! use dependency_resolver::logging;
//!
//! // Only the resolver's own events, down to every `make`
//! logging::builder().trace().resolver_only().pretty().init();
//! ```

use tracing::Level;

/// Target every resolver event is emitted under
pub const TARGET: &str = "dependency_resolver";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON lines
    #[default]
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single-line
    Compact,
}

/// Builder for the logging subscriber
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Include every `make` and invocation
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show the resolver's own events
    pub fn resolver_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// `EnvFilter` directive for the configured level and target
    pub fn directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        match self.target {
            Some(target) => format!("{}={}", target, level),
            None => level,
        }
    }

    /// Install the subscriber; panics if one is already set
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        if let Err(err) = self.try_init() {
            panic!("failed to install the logging subscriber: {}", err);
        }
    }

    /// Install the subscriber, reporting whether one was already set
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::new(self.directive());
        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            // JSON output needs `logging-json`; fall back to the default layout
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        }
    }

    /// No subscriber without `logging-json` or `logging-pretty`
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install the default subscriber: JSON with `logging-json`, pretty otherwise
pub fn init() {
    #[cfg(feature = "logging-json")]
    builder().json().init();
    #[cfg(not(feature = "logging-json"))]
    builder().pretty().init();
}

/// Install a subscriber showing only the resolver's own events
pub fn init_resolver_only() {
    builder().resolver_only().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.target.is_none());
        assert_eq!(builder.directive(), "debug");
    }

    #[test]
    fn test_resolver_only_directive() {
        let builder = LoggingBuilder::new()
            .trace()
            .compact()
            .with_file()
            .with_thread_ids()
            .resolver_only();

        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.with_file);
        assert!(builder.with_thread_ids);
        assert_eq!(builder.directive(), "dependency_resolver=trace");
    }
}
