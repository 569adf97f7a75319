//! Core persona library (config, API client, auth session, resources).

pub mod api;
pub mod config;
pub mod resources;
pub mod session;
