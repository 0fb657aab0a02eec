// ABOUTME: Service model over the merged compose configuration.
// ABOUTME: Declarations with label-driven settings and lookup by name or domain.

mod declaration;
mod locator;

pub use declaration::*;
pub use locator::{LookupError, ServiceLocator};
