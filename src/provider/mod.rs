//! Application-wide state provider and scope-checked handles.

mod provider;
mod scope;

pub use provider::Provider;

pub(crate) use scope::Scoped;
