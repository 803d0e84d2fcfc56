//! Route handlers for the HTTP API.

pub mod auth;
pub mod convert;
pub mod download;
pub mod health;
pub mod progress;
pub mod upload;
