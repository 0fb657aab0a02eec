// ABOUTME: Capability traits for the container driver facade.
// ABOUTME: Defines ReplicaOps and ServiceOps plus the types they exchange.

mod replica;
mod service;
mod shared_types;

pub use replica::ReplicaOps;
pub use service::{LogLines, ServiceOps};
pub use shared_types::*;

/// Everything rollouts and service operations need from an engine.
pub trait Driver: ReplicaOps + ServiceOps {}

impl<T: ReplicaOps + ServiceOps + ?Sized> Driver for T {}
