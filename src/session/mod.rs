mod store;

pub use store::{SessionInfo, SessionSnapshot, SessionStore};
