pub mod alerts;
pub mod auth;
pub mod detector;
pub mod error;
pub mod inference;
pub mod rate_limit;
