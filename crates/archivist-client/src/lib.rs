//! Wayback Machine client implementing the core capture port.

pub mod config;
pub mod wayback;

pub use config::WaybackConfig;
pub use wayback::WaybackClient;
