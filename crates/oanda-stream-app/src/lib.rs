/*
[INPUT]:  Public API exports for oanda-stream-app crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod runner;

// Re-export main types for convenience
pub use config::AppConfig;
pub use runner::{OutputMode, run};
