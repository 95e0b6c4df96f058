//! Kernel of the bookshelf service: layered settings, the module lifecycle
//! trait, and the registry that drives modules through it.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
