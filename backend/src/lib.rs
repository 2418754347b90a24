//! GameSphere Backend Library
//!
//! Authorization gate and backup pipeline for the GameSphere marketplace.

#[macro_use]
mod macros;

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
