//! The public logging macros.
//!
//! Every macro captures the call site through `file!()`, `module_path!()`
//! and `line!()` and formats its arguments in the manner of `format!`. None
//! of them can fail: any internal condition is absorbed by the pipeline.

/// Capture the identity of the expansion site.
#[doc(hidden)]
#[macro_export]
macro_rules! __caller {
    () => {{
        fn __f() {}
        $crate::report::CallerInfo::new(
            ::core::file!(),
            ::core::module_path!(),
            $crate::report::function_name(__f),
            ::core::line!(),
        )
    }};
}

/// Log a message with level trace. Emitted only when trace mode is enabled;
/// never buffered.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Trace, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level debug.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Debug, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level info.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Info, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level warn.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Warn, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level error.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Error, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level fatal. Never buffered.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::__private::log($crate::Level::Fatal, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level info, only the first time this call site runs.
#[macro_export]
macro_rules! log_once_info {
    ($($arg:tt)*) => {
        $crate::__private::log_once($crate::Level::Info, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level warn, only the first time this call site runs.
#[macro_export]
macro_rules! log_once_warn {
    ($($arg:tt)*) => {
        $crate::__private::log_once($crate::Level::Warn, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level error, only the first time this call site runs.
#[macro_export]
macro_rules! log_once_error {
    ($($arg:tt)*) => {
        $crate::__private::log_once($crate::Level::Error, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level debug, only the first time this call site runs.
#[macro_export]
macro_rules! log_once_debug {
    ($($arg:tt)*) => {
        $crate::__private::log_once($crate::Level::Debug, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level info, only when the message changed since the
/// last call from this site.
#[macro_export]
macro_rules! log_on_change_info {
    ($($arg:tt)*) => {
        $crate::__private::log_on_change($crate::Level::Info, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level warn, only when the message changed since the
/// last call from this site.
#[macro_export]
macro_rules! log_on_change_warn {
    ($($arg:tt)*) => {
        $crate::__private::log_on_change($crate::Level::Warn, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level error, only when the message changed since the
/// last call from this site.
#[macro_export]
macro_rules! log_on_change_error {
    ($($arg:tt)*) => {
        $crate::__private::log_on_change($crate::Level::Error, ::std::format!($($arg)*), $crate::__caller!())
    };
}

/// Log a message with level debug, only when the message changed since the
/// last call from this site.
#[macro_export]
macro_rules! log_on_change_debug {
    ($($arg:tt)*) => {
        $crate::__private::log_on_change($crate::Level::Debug, ::std::format!($($arg)*), $crate::__caller!())
    };
}
