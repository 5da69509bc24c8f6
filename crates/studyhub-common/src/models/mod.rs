//! Core domain models shared across all StudyHub services.
//!
//! These are the "truth" types: what the document store holds and the API serializes.
//! Documents use camelCase field names so they stay readable by the browser client.

pub mod community;
pub mod content;
pub mod join_request;
pub mod membership;
pub mod notification;
pub mod user;

/// Re-export all model types for convenience.
pub use community::*;
pub use content::*;
pub use join_request::*;
pub use membership::*;
pub use notification::*;
pub use user::*;
