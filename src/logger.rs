use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{stderr, stdout, Write};
use std::sync::Once;

/// Log implementation for standard output streams
///
/// Errors go to standard error, everything else to standard output. Each line carries a short
/// prefix instead of the level name.
pub struct StdLogger {
    level: LevelFilter,
}

impl StdLogger {
    /// Initialize logger
    ///
    /// Even if this function is called multiple times, initialization will only be done once. If
    /// another logger has already been installed, that logger stays in place.
    pub fn init(verbose: bool) {
        static INIT: Once = Once::new();

        INIT.call_once(|| {
            let level = Self::level_for(verbose);
            if log::set_boxed_logger(Box::new(StdLogger { level })).is_ok() {
                log::set_max_level(level);
            }
        });
    }

    /// Warnings and errors only, unless verbose output was requested
    pub fn level_for(verbose: bool) -> LevelFilter {
        if verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }

    fn prefix(level: Level) -> &'static str {
        match level {
            Level::Error | Level::Warn => "[-]",
            Level::Info => "[i]",
            _ => "[+]",
        }
    }
}

impl Log for StdLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let prefix = Self::prefix(record.level());
        if record.level() == Level::Error {
            let _ = writeln!(stderr().lock(), "{} {}", prefix, record.args());
        } else {
            let _ = writeln!(stdout().lock(), "{} {}", prefix, record.args());
        }
    }

    /// Flush buffered output stream
    fn flush(&self) {
        let _ = stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_init() {
        // Repeated calls are fine
        StdLogger::init(true);
        StdLogger::init(false);

        trace!("trace log succeeded");
        info!("info log succeeded");
        warn!("warn log succeeded");
        error!("error log succeeded");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(StdLogger::level_for(true), LevelFilter::Info);
        assert_eq!(StdLogger::level_for(false), LevelFilter::Warn);
    }

    #[test]
    fn enabled_honours_level() {
        let logger = StdLogger {
            level: LevelFilter::Warn,
        };

        let warn = Metadata::builder().level(Level::Warn).build();
        let info = Metadata::builder().level(Level::Info).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));
    }

    #[test]
    fn prefixes() {
        assert_eq!(StdLogger::prefix(Level::Error), "[-]");
        assert_eq!(StdLogger::prefix(Level::Info), "[i]");
        assert_eq!(StdLogger::prefix(Level::Trace), "[+]");
    }
}
