pub mod chrome;
pub mod session;

pub use session::{KioskSession, Navigator, SessionState};
