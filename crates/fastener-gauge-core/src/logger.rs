//! Logging setup for the gauge tools.
//!
//! `init_with_level` installs an `env_logger` on stderr with lines like
//! `[  1.234s  INFO fastener_gauge::pipeline] message`. The level comes from
//! the caller (the CLI's `--log-level`); `RUST_LOG` directives refine it per
//! target.

use std::io::Write;
use std::time::Instant;

use env_logger::{Builder, Target};
use log::LevelFilter;

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

fn gauge_logger(level: LevelFilter) -> Builder {
    let started = Instant::now();
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .target(Target::Stderr)
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{:7.3}s {:>5} {}] {}",
                started.elapsed().as_secs_f64(),
                record.level(),
                record.target(),
                record.args()
            )
        });
    builder
}

/// Install the stderr logger. Fails if a logger is already installed.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    gauge_logger(level).try_init()
}

/// `tracing` filter directive for `level`, unless `RUST_LOG` is set.
#[cfg(feature = "tracing")]
fn tracing_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()))
}

/// Install a `tracing` subscriber with span close events.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter = tracing_filter(level);
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_once() {
        assert!(init_with_level(LevelFilter::Debug).is_ok());
        log::debug!(target: "fastener_gauge_core::tests", "logger installed");
        assert!(init_with_level(LevelFilter::Info).is_err());
    }
}
