//! Deliberate violation injection for closed-loop validator testing.

pub mod errors;
pub mod injector;
pub mod model;

pub use errors::InjectError;
pub use injector::ErrorInjector;
pub use model::{InjectOptions, InjectionEntry, InjectionReport};
