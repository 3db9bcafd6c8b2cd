//! Tracing setup shared by the publish server and the CLI.
//!
//! This crate provides a single initialization entry point so both
//! binaries produce logs in the same format, with the same env-driven
//! filtering.

use std::time::Instant;

use parking_lot::Once;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        MakeWriter,
        format::{FmtSpan, Writer},
        time::FormatTime,
    },
    util::SubscriberInitExt,
};

/// Distinguishes the binary consuming the tracing output, so each gets
/// a sensible default verbosity and span-event policy.
#[derive(PartialEq, Eq)]
pub enum TracingConsumer {
    /// The `receive` server: info by default, span open/close events.
    Server,
    /// The `push`/`gentoken` CLI: warn by default, no span events.
    Tool,
    /// Test binaries: trace level for our own crates.
    Test,
}

/// Initializes tracing with stdout as the output. Safe to call more than
/// once; only the first call takes effect.
pub fn init_tracing(consumer: TracingConsumer, verbose: bool) {
    init_tracing_with_writer(consumer, verbose, std::io::stdout);
}

pub fn init_tracing_with_writer<W>(consumer: TracingConsumer, verbose: bool, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
{
    static INIT: Once = Once::new();
    INIT.call_once(move || {
        let default_level = match consumer {
            TracingConsumer::Tool if !verbose => LevelFilter::WARN,
            TracingConsumer::Test => LevelFilter::TRACE,
            _ if verbose => LevelFilter::DEBUG,
            _ => LevelFilter::INFO,
        };

        let mut filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env()
            .expect("invalid RUST_LOG directive");

        if consumer == TracingConsumer::Test {
            filter = filter
                .add_directive("ostreeup_core=trace".parse().unwrap())
                .add_directive("ostreeup_client=trace".parse().unwrap())
                .add_directive("ostreeup_server=trace".parse().unwrap());
        }

        let span_events = if consumer == TracingConsumer::Server {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let color = !std::env::var("NO_COLOR").is_ok_and(|s| !s.is_empty());

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(span_events)
            .with_ansi(color)
            .with_timer(ElapsedTime::new())
            .with_writer(writer)
            .finish()
            .try_init()
            .expect("failed to install tracing subscriber");
    });
}

/// Formats timestamps as seconds elapsed since process start, which is
/// cheaper than wall-clock formatting and enough to correlate log lines
/// during a single publish.
struct ElapsedTime {
    start: Instant,
}

impl ElapsedTime {
    fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl FormatTime for ElapsedTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let e = self.start.elapsed();
        let millis = (e.subsec_nanos() as f64 / 1_000_000.0).round();
        write!(w, "{:>5}.{:03}s", e.as_secs(), millis)
    }
}
