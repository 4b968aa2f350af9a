//! HTTP API: request handlers and response models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: JSON response bodies
//!
//! # Routes
//!
//! - `GET /test`: liveness message
//! - `POST /parse-document`: upload a PDF or Word file (multipart field `document`) and get its
//!   text back
//!
//! All endpoints are documented with `utoipa` and browsable at `/docs`.

pub mod handlers;
pub mod models;
