//! Metering reverse proxy for the Anthropic Messages API.
//!
//! This crate provides the HTTP service implementing the metering proxy:
//!
//! - Bearer-credential verification (`auth`)
//! - A balance cache with fresh/stale/fail-closed semantics (`balance_cache`)
//! - A pass-through SSE usage extractor (`sse`)
//! - A fire-and-forget usage reporter with bounded retries (`reporter`)
//! - The `/v1/messages` gating request handler (`handlers::messages`)

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod balance_cache;
pub mod billing_client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod reporter;
pub mod routes;
pub mod sse;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
