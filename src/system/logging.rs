//! JSON-lines logging for host builds. ESP32 builds use the ESP-IDF logger
//! instead.
//!
//! The crate logs through the `log` macros; those records are forwarded into
//! a `tracing-subscriber` JSON formatter filtered by `HOTTUB_LOG`.

use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

pub const LEVEL_ENV: &str = "HOTTUB_LOG";
const DEFAULT_FILTER: &str = "info";

/// `EnvFilter` directives such as `debug` or `hottub_rs::controller=trace`.
/// Missing or unparsable directives fall back to `info`.
pub fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn json_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

pub fn init() -> anyhow::Result<()> {
    let directives = std::env::var(LEVEL_ENV).ok();
    LogTracer::init()?;
    tracing::subscriber::set_global_default(json_subscriber(
        filter(directives.as_deref()),
        std::io::stdout,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<serde_json::Value> {
            let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            raw.lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter(None).to_string(), "info");
        assert_eq!(filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            filter(Some(" hottub_rs::controller=trace ")).to_string(),
            "hottub_rs::controller=trace"
        );
    }

    #[test]
    fn test_events_are_json_lines() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = json_subscriber(filter(Some("info")), move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "hottub_rs::controller", "Shutting down: {}", "Heating too slowly");
            tracing::debug!(target: "hottub_rs::controller", "cycleCounter: 3");
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "WARN");
        assert_eq!(lines[0]["target"], "hottub_rs::controller");
        assert_eq!(
            lines[0]["fields"]["message"],
            "Shutting down: Heating too slowly"
        );
    }
}
