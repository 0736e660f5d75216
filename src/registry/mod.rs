//! # Registries
//!
//! The resource catalog (`ResourceRegistry`) and the step handler
//! resolution table (`HandlerRegistry`).

pub mod handler_registry;
pub mod resource_registry;

pub use handler_registry::HandlerRegistry;
pub use resource_registry::ResourceRegistry;
