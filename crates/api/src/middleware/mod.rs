//! HTTP middleware.
//!
//! - [`diagnostics::expose_error_diagnostics`] -- Swaps the generic 500 body
//!   for error details outside production.
//! - [`diagnostics::handle_panic`] -- Turns a handler panic into a JSON 500.
//! - [`timeout::timeout_detail`] -- Gives timed-out requests a JSON 408 body.

pub mod diagnostics;
pub mod timeout;
