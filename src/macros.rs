//! Logging macros for the global emitter.
//!
//! Each macro formats its message like `format!`, records the calling
//! module, function and line, and hands the event to the emitter installed
//! with [`init`](crate::init). Nothing is formatted when no sink would
//! accept the level.
//!
//! # Examples
//!
//! ```
//! use tiered_log_pipeline::{info, error};
//!
//! let game_id = 42;
//! info!("app.matchmaking", "game_id={} created", game_id);
//!
//! // Structured fields go in braces before the message
//! error!("app.matchmaking", { "game_id" => game_id, "player_id" => 7 }, "player timed out");
//! ```

/// Strip a `type_name` path down to the enclosing function's name
#[doc(hidden)]
pub fn short_function_name(type_name: &'static str) -> &'static str {
    let mut name = type_name.strip_suffix("::__f").unwrap_or(type_name);
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    match name.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

/// Name of the function this macro expands in
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::macros::short_function_name(__type_name_of(__f))
    }};
}

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::{log, LogLevel};
/// log!(LogLevel::Warning, "app.ws", "client {} lagging", 7);
/// ```
#[macro_export]
macro_rules! log {
    ($level:expr, $logger:expr, { $($key:literal => $value:expr),* $(,)? }, $($arg:tt)+) => {{
        let __level = $level;
        if $crate::core::emitter::enabled(__level) {
            let __event = $crate::core::LogEvent::new(__level, $logger, format!($($arg)+))
                .at($crate::core::CallSite::new(
                    module_path!(),
                    $crate::__function_name!(),
                    line!(),
                ))
                $(.with_field($key, $value))*;
            $crate::core::emitter::emit_event(__event);
        }
    }};
    ($level:expr, $logger:expr, $($arg:tt)+) => {
        $crate::log!($level, $logger, {}, $($arg)+)
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::debug;
/// debug!("app.bot", "evaluating {} candidate words", 12);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($crate::LogLevel::Debug, $logger, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($crate::LogLevel::Info, $logger, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($crate::LogLevel::Warning, $logger, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::error;
/// error!("app.db", { "game_id" => 42 }, "commit failed: {}", "disk full");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($crate::LogLevel::Error, $logger, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($crate::LogLevel::Critical, $logger, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_function_name() {
        assert_eq!(short_function_name("app::game::start_round::__f"), "start_round");
        assert_eq!(
            short_function_name("app::game::start_round::{{closure}}::__f"),
            "start_round"
        );
        assert_eq!(short_function_name("main::__f"), "main");
    }

    #[test]
    fn test_function_name_macro() {
        let name = crate::__function_name!();
        assert_eq!(name, "test_function_name_macro");
    }

    #[test]
    fn test_macro_forms_expand() {
        // Every form must expand whether or not a global emitter is installed
        crate::debug!("app.test", "plain");
        crate::info!("app.test", "value {}", 1);
        crate::warning!("app.test", { "player_id" => 7 }, "fields");
        crate::error!("app.test", { "game_id" => 42, "round" => 3, }, "both {}", "forms");
        crate::critical!("app.test", "done");
    }
}
