//! FILENAME: core/cube-engine/src/logging.rs
// PURPOSE: Category-tagged logging on top of the `log` facade.
//
// Lines are written as `CATEGORY|message` on the `cube_engine` target. The
// library never installs a logger; the host application decides where the
// lines go.

pub const TARGET: &str = "cube_engine";

/// Write a log line in unified format
pub fn write_log(level: log::Level, category: &str, message: &str) {
    log::log!(target: TARGET, level, "{}|{}", category, message);
}

/// Write an ENTER log line for function entry
pub fn write_log_enter(category: &str, func_name: &str, params: &str) {
    let message = if params.is_empty() {
        format!("ENTER {}", func_name)
    } else {
        format!("ENTER {} {}", func_name, params)
    };
    write_log(log::Level::Trace, category, &message);
}

/// Write an EXIT log line for function exit
pub fn write_log_exit(category: &str, func_name: &str, result: &str) {
    let message = if result.is_empty() {
        format!("EXIT {}", func_name)
    } else {
        format!("EXIT {} {}", func_name, result)
    };
    write_log(log::Level::Trace, category, &message);
}

// ============================================================================
// MACRO DEFINITIONS & EXPORTS
// ============================================================================

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        if log::log_enabled!(target: $crate::logging::TARGET, log::Level::Debug) {
            $crate::logging::write_log(log::Level::Debug, $cat, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log(log::Level::Info, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log(log::Level::Warn, $cat, &format!($($arg)*))
    };
}

// ENTER/EXIT macros for function tracing

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_enter($cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_enter($cat, $func, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_exit($cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_exit($cat, $func, &format!($($arg)*))
    };
}
