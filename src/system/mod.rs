pub mod config;
#[cfg(not(target_os = "espidf"))]
pub mod logging;

#[cfg(target_os = "espidf")]
pub mod wifi;

pub use config::*;
