//! In-memory, newest-first log of errors recorded during the session.

mod entry;
mod error_log;

pub use entry::ErrorLogEntry;
pub use error_log::ErrorLog;

pub(crate) use error_log::ErrorLogInner;
