//! Tracing initialisation for depcrawl binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Build a subscriber writing to `writer`.
///
/// `RUST_LOG` wins over `level` when set. With `json`, every event is written
/// as one JSON object per line, which keeps per-identifier fields such as
/// `identifier` machine-readable.
pub fn subscriber<W>(json: bool, level: Level, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(writer);
    if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.finish())
    }
}

/// Install the global subscriber. Logs go to stderr in both formats so
/// command output on stdout stays clean.
pub fn init_tracing(json: bool, level: Level) {
    tracing::subscriber::set_global_default(subscriber(json, level, std::io::stderr)).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(json: bool) -> String {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = subscriber(json, Level::INFO, move || writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(identifier = "example.org/a", "fetch failed");
        });
        buffer.contents()
    }

    #[test]
    fn json_events_go_to_the_given_writer() {
        let out = capture(true);
        let line = out.lines().next().unwrap();
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["fields"]["message"], "fetch failed");
        assert_eq!(event["fields"]["identifier"], "example.org/a");
    }

    #[test]
    fn text_events_go_to_the_given_writer() {
        let out = capture(false);
        assert!(out.contains("fetch failed"));
        assert!(out.contains("example.org/a"));
        assert!(!out.trim_start().starts_with('{'));
    }

    #[test]
    fn repeated_initialisation_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
