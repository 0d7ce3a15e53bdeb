//! IG Engage: Instagram comment-to-DM automation backend.

pub mod analytics;
pub mod api;
pub mod config;
pub mod diagnostics;
pub mod engage;
pub mod error;
pub mod model;
pub mod registry;
pub mod store;
