//! Library crate for crypto-scan-rs exposing reusable modules.
pub mod codescan;
pub mod logging;
pub mod output;
pub mod patterns;
pub mod targets;
pub mod tls;
pub mod types;
