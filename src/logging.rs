// 📝 Logging - tracing subscriber shared by the CLI and the trigger server
// RUST_LOG wins over the default level; timestamps are local HH:MM:SS.

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter from `RUST_LOG`, falling back to `default_level`
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(format: LogFormat, default_level: &str) -> bool {
    let timer = ChronoLocal::new("%H:%M:%S".to_string());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_timer(timer)
        .with_target(false);

    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        init(LogFormat::Text, "warn");
        assert!(!init(LogFormat::Json, "warn"));
    }
}
