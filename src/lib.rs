pub mod controller;
pub mod hardware;
pub mod hysteresis;
pub mod rate;
pub mod regime;
pub mod remote;
pub mod runtime;
pub mod safety;
pub mod sim;
pub mod state;
pub mod system;
pub mod types;
pub mod window;

pub use controller::*;
pub use types::*;
