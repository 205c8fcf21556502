use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single lines on stdout.
    Compact,
    /// JSON lines on stderr, for running under a log collector.
    Json,
}

/// Our two binaries log at `level` (info unless configured); --verbose forces debug.
fn default_directive(verbose: bool, level: Option<&str>) -> String {
    let (ours, others) = match (verbose, level) {
        (true, _) => ("debug".to_string(), "info"),
        (false, Some(level)) => (level.to_ascii_lowercase(), "warn"),
        (false, None) => ("info".to_string(), "warn"),
    };
    format!("docquery={ours},toml_docquery={ours},{others}")
}

// RUST_LOG 優先
fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, level)))
}

pub fn init_logger(verbose: bool, format: LogFormat, level: Option<&str>) {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(default_filter(verbose, level));
    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry
            .with(layer.with_writer(std::io::stderr).json())
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(
            default_directive(false, None),
            "docquery=info,toml_docquery=info,warn"
        );
        assert_eq!(
            default_directive(false, Some("TRACE")),
            "docquery=trace,toml_docquery=trace,warn"
        );
        assert_eq!(
            default_directive(true, Some("error")),
            "docquery=debug,toml_docquery=debug,info"
        );
    }
}
