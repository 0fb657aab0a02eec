// ABOUTME: Shared domain types.
// ABOUTME: Container names and replica instance numbers.

mod container_name;

pub use container_name::{ContainerName, ContainerNameError, InstanceNum};
