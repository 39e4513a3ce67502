pub mod clock;
pub mod config;
pub mod error;
pub mod time_delta;

pub use clock::{Clock, SimulatedClock, SteadyClock, Timestamp};
pub use error::*;
