pub mod config;
pub mod driver;
pub mod errors;
pub mod events;
pub mod locator;
pub mod retry;
pub mod session;
pub mod workflows;

pub use config::{AutomationConfig, SessionConfig, Timeouts};
pub use driver::{Driver, DriverCall, DriverHandler, DriverResponse, WaitState};
pub use errors::{AutomationError, ErrorKind, Result};
pub use events::{progress_bar, EventLog, LogEntry, LogLevel};
pub use locator::{LocatorCandidates, ProbeHit, Prober};
pub use retry::{retry, Backoff, RetryPolicy};
pub use session::{SessionInfo, SessionSnapshot, SessionStore};
pub use workflows::WorkflowContext;
