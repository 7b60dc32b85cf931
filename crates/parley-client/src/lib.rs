pub mod session;

pub use session::{ChatSession, LoadState, SessionEffect};
