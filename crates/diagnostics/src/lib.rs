//! Lightweight logging for the firth workspace
//!
//! Provides a single, env-var controlled logging setup shared by every crate
//! in the project.
//!
//! Usage:
//! - Set FIRTH_LOG=off (default) - no logs
//! - Set FIRTH_LOG=info - basic operation logs
//! - Set FIRTH_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the FIRTH_LOG environment variable.
///
/// Call once at process startup. Safe to call multiple times - subsequent
/// calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let level = std::env::var("FIRTH_LOG").unwrap_or_else(|_| "off".to_string());

        let min_level = match level.as_str() {
            "off" => return,
            "debug" => emit::Level::Debug,
            "info" => emit::Level::Info,
            "warn" => emit::Level::Warn,
            "error" => emit::Level::Error,
            other => {
                eprintln!("Warning: Unknown FIRTH_LOG value '{}', using 'info'", other);
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min_level))
            .init();

        // The emitter must outlive every logging call site.
        std::mem::forget(rt);
    });
}

/// Log basic operations (saves, uploads, rotations, etc.)
///
/// Use this for operations that users might want to see in normal usage.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (byte counts, segment names, internal state, etc.)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (config issues, fallbacks, recoverable errors)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log critical error conditions (failures, unrecoverable errors)
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
