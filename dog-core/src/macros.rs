// macros.rs
// Logging front end. `info!`, `warn!` and `error!` go to the `log` facade,
// to defmt when built with the `defmt` feature, and into the event recorder.
// The `local_*` variants, `debug!` and `trace!` skip the recorder.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! defmt_forward {
    ($level:ident, $($arg:tt)*) => {
        ::defmt::$level!($($arg)*);
    };
}

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! defmt_forward {
    ($level:ident, $($arg:tt)*) => {};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(info, $($arg)*);
        ::log::info!($($arg)*);
        $crate::log_to_recorder!($crate::log::LogLevel::Info, $($arg)*);
    };
}

#[macro_export]
macro_rules! local_info {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(info, $($arg)*);
        ::log::info!($($arg)*);
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(warn, $($arg)*);
        ::log::warn!($($arg)*);
        $crate::log_to_recorder!($crate::log::LogLevel::Warn, $($arg)*);
    };
}

#[macro_export]
macro_rules! local_warn {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(warn, $($arg)*);
        ::log::warn!($($arg)*);
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(error, $($arg)*);
        ::log::error!($($arg)*);
        $crate::log_to_recorder!($crate::log::LogLevel::Error, $($arg)*);
    };
}

#[macro_export]
macro_rules! local_error {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(error, $($arg)*);
        ::log::error!($($arg)*);
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(debug, $($arg)*);
        ::log::debug!($($arg)*);
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::defmt_forward!(trace, $($arg)*);
        ::log::trace!($($arg)*);
    };
}

// Messages longer than `MAX_LOG_MSG_LEN` are cut at the first piece that does not fit.
#[macro_export]
macro_rules! log_to_recorder {
    ($level:expr, $($arg:tt)*) => {
        {
            use core::fmt::Write;
            let mut s = $crate::log::LogMessage::new();
            let _ = write!(s, $($arg)*);
            $crate::log::record($crate::log::LogEntry::Log($crate::log::now_ticks(), $level, s));
        }
    };
}

/// Records a static event string in the recorder and logs it at info level.
#[macro_export]
macro_rules! event {
    ($msg:expr) => {
        $crate::local_info!("{}", $msg);
        $crate::log::record($crate::log::LogEntry::Event($crate::log::now_ticks(), $msg));
    };
}
