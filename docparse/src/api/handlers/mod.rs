//! HTTP request handlers.
//!
//! Handlers return [`crate::errors::Result`], so every failure is rendered as a JSON
//! `{"error": ...}` body with a 400 or 500 status.

pub mod documents;
pub mod status;
