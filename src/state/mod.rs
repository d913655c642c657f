//! Shared state cells with synchronous change notification.
//!
//! The store selection and the error log are both built on [`StateCell`]:
//! views subscribe to a cell and are called back on every change.

mod state;

pub use state::{StateCell, Subscription};
