pub mod error;
pub mod ident;
pub mod types;
pub mod config;
pub mod job;
pub mod db;
pub mod catalog;
pub mod registry;
pub mod partition;
pub mod reconcile;
pub mod ddl;
pub mod exec;
pub mod bridge;

pub use bridge::CatalogBridge;
pub use error::{BridgeError, BridgeResult};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
