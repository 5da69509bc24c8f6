//! # studyhub-common
//!
//! Shared types, configuration, error handling, and utilities used across all StudyHub crates.
//! This is the foundation layer: no workflows, just primitives and contracts.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod snowflake;
pub mod validation;
