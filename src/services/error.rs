//! Log-and-map helpers for route handlers
//!
//! Store and upstream failures bubble up as `Display`able errors; handlers
//! log them with a `[tag]` context and collapse to a bare status for the
//! client.

use axum::http::StatusCode;

/// Extension trait converting handler errors to a logged `StatusCode`.
pub trait LogErr<T> {
    /// Log with context and map to INTERNAL_SERVER_ERROR.
    fn log_500(self, context: &str) -> Result<T, StatusCode>;

    /// Log with context and map to the given status.
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.log_status(context, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|err| {
            eprintln!("{}: {}", context, err);
            status
        })
    }
}
