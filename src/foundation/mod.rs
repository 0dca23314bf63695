pub(crate) mod config;
pub(crate) mod diagnostics;
pub(crate) mod error;
