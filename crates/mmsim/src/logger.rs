use std::{
    fmt,
    io::{self, Write as _},
};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::style::{Color, Paint};

/// Writes log records to stderr as `LEVEL target: message`.
pub struct StderrLogger {
    max_level: LevelFilter,
    color: bool,
}

impl StderrLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, color: bool) -> Self {
        Self { max_level, color }
    }

    /// Installs the logger. Call once at startup.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

/// Maps the number of `-v` switches to a level filter.
#[must_use]
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = LevelFormat {
            level: record.level(),
            color: self.color,
        };
        // nowhere left to report a failing stderr
        let _ = writeln!(
            io::stderr().lock(),
            "{level} {}: {}",
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

struct LevelFormat {
    level: Level,
    color: bool,
}

impl fmt::Display for LevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (color, label) = match self.level {
            Level::Trace => (Color::Magenta, "TRACE"),
            Level::Debug => (Color::Blue, "DEBUG"),
            Level::Info => (Color::Green, " INFO"),
            Level::Warn => (Color::Yellow, " WARN"),
            Level::Error => (Color::Red, "ERROR"),
        };
        write!(f, "{}", Paint::new(color, label, self.color))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Info);
        assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(2), LevelFilter::Trace);
        assert_eq!(level_for_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn test_level_format() {
        let plain = LevelFormat {
            level: Level::Info,
            color: false,
        };
        assert_eq!(plain.to_string(), " INFO");
        let colored = LevelFormat {
            level: Level::Warn,
            color: true,
        };
        assert_eq!(colored.to_string(), "\x1B[33;1m WARN\x1B[0m");
    }

    #[test]
    fn test_enabled_respects_max_level() {
        let logger = StderrLogger::new(LevelFilter::Info, false);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
