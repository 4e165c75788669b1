//! Logging facilities.
//!
//! The macros take any expression exposing `time()` (the simulation clock) and `name()` (used as the log target),
//! which in practice is a [`Scheduler`](crate::scheduler::Scheduler). Lines look like `[<clock> <LEVEL> <name>] <msg>`.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $msg:expr) => (
        log::$level!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(), $crate::log::get_colored($label, $crate::colored::Color::$color), $ctx.name(), $msg
        )
    );
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $format:expr, $($arg:tt)+) => (
        log::$level!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(), $crate::log::get_colored($label, $crate::colored::Color::$color), $ctx.name(), $($arg)+
        )
    );
}

/// Logs a message at the info level.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use env_logger::Builder;
/// use mlfq_batch::{log_info, Scheduler, SchedulerConfig};
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let sched = Scheduler::new(SchedulerConfig::new(5, 1)).unwrap();
/// log_info!(sched, "started with {} levels", sched.config().num_levels);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(info, "INFO", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(warn, "WARN", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(error, "ERROR", Red, $ctx, $($arg)+));
}
