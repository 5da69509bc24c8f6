//! HTTP route handlers, grouped by resource.

pub mod account;
pub mod communities;
pub mod health;
pub mod requests;
