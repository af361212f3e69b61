mod facade;
mod protocol;

pub use facade::{Driver, DriverHandler};
pub use protocol::{DriverCall, DriverResponse, WaitState};
