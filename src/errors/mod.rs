mod types;

pub use types::{AutomationError, ErrorKind, Result};
