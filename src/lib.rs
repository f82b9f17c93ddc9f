pub mod browser;
pub mod config;
pub mod errors;
pub mod server;
pub mod testing;

pub use browser::{KioskSession, Navigator, SessionState};
pub use config::KioskConfig;
pub use errors::{KioskError, Result};
