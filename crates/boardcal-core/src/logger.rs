//! Stderr logging for the calibration tools.
//!
//! Calibration readings are printed on stdout for the operator; everything
//! logged here goes to stderr as `[elapsed LEVEL module] message`. Records
//! from the `boardcal*` crates pass at the configured level, other crates
//! only at `Warn` and above.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_PREFIX: &str = "boardcal";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn max_level_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_PREFIX) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

/// `boardcal_core::session` -> `session`; foreign targets stay whole.
fn short_target(target: &str) -> &str {
    match target.split_once("::") {
        Some((krate, rest)) if krate.starts_with(OWN_PREFIX) => rest,
        _ => target,
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => " WARN",
            Level::Info => " INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {tag} {}] {}",
            self.started.elapsed().as_secs_f64(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// `level` for the boardcal crates, `warn` (or `level` if lower) elsewhere.
#[cfg(feature = "tracing")]
fn default_directives(level: LevelFilter) -> String {
    let own = level.as_str().to_ascii_lowercase();
    let foreign = level.min(LevelFilter::Warn).as_str().to_ascii_lowercase();
    format!("{foreign},boardcal={own},boardcal_core={own},boardcal_circles={own}")
}

/// Install a `tracing` subscriber on stderr. `RUST_LOG`, when set, replaces
/// the filter built from `level`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_targets_are_shortened() {
        assert_eq!(short_target("boardcal_core::session"), "session");
        assert_eq!(short_target("boardcal::calibration_loop"), "calibration_loop");
        assert_eq!(short_target("image::codecs::png"), "image::codecs::png");
        assert_eq!(short_target("boardcal"), "boardcal");
    }

    #[test]
    fn foreign_crates_are_capped_at_warn() {
        let logger = StderrLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(logger.max_level_for("boardcal_circles::hough"), LevelFilter::Debug);
        assert_eq!(logger.max_level_for("png::decoder"), LevelFilter::Warn);

        let quiet = StderrLogger {
            level: LevelFilter::Error,
            started: Instant::now(),
        };
        assert_eq!(quiet.max_level_for("png::decoder"), LevelFilter::Error);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_filter_follows_the_requested_level() {
        assert_eq!(
            default_directives(LevelFilter::Debug),
            "warn,boardcal=debug,boardcal_core=debug,boardcal_circles=debug"
        );
        assert_eq!(
            default_directives(LevelFilter::Warn),
            "warn,boardcal=warn,boardcal_core=warn,boardcal_circles=warn"
        );
        assert!(default_directives(LevelFilter::Off).starts_with("off,boardcal=off"));
    }
}
