use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "linkslide_imaging" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit one JSON object per line instead of the human-readable format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Filter directive string built from the level and module overrides.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Returned by [`init_telemetry`]; holds the effective filter for diagnostics.
#[derive(Debug)]
pub struct TelemetryGuard {
    filter: String,
    installed: bool,
}

impl TelemetryGuard {
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// False when a global subscriber was already set (tests, embedding).
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Initialize the tracing subscriber. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let filter_str = config.filter_directives();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));
    let filter = env_filter.to_string();

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok();

    TelemetryGuard { filter, installed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert_eq!(TelemetryConfig::default().filter_directives(), "info");
    }

    #[test]
    fn module_overrides_are_appended() {
        let config = TelemetryConfig {
            log_level: Level::WARN,
            module_levels: vec![
                ("linkslide_imaging".into(), Level::DEBUG),
                ("linkslide_agent".into(), Level::TRACE),
            ],
            json: true,
        };
        assert_eq!(
            config.filter_directives(),
            "warn,linkslide_imaging=debug,linkslide_agent=trace"
        );
    }

    #[test]
    fn second_init_does_not_panic() {
        let _first = init_telemetry(TelemetryConfig::default());
        let second = init_telemetry(TelemetryConfig::default());
        assert!(!second.installed());
    }
}
