// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the Courier messaging gateway.
//!
//! Exposes connection control, notification dispatch, runtime settings, and
//! hosted media. `/health`, `/metrics` and `/media/{id}` are public; the
//! `/v1` routes require a bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{AppState, HealthState, ServerConfig, router, start_server};
