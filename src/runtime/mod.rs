// ABOUTME: Container driver facade over compose and the Docker engine.
// ABOUTME: Exposes replica and service capability traits plus the compose-backed driver.

mod compose;
mod error;
pub mod process;
mod replica_set;
pub mod traits;

pub use compose::ComposeDriver;
pub use error::{DriverError, DriverErrorKind};
pub use replica_set::ReplicaSet;
pub use traits::*;
