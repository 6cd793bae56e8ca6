//! Logging utilities with request context support.
//!
//! Every inbound request gets an id that is kept in task-local storage so log
//! lines emitted while handling it can be correlated.

/// Header used to accept and echo request ids.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    /// Task-local storage for the current request ID.
    pub static REQUEST_ID: String;
}

/// Get the current request ID from context, if set.
///
/// Returns an empty string if no request ID is set.
pub fn get_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

/// Current request ID, or a freshly generated one outside a request scope.
pub fn current_or_new_request_id() -> String {
    REQUEST_ID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| generate_request_id())
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
