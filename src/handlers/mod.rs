//! HTTP handlers, grouped by the area of the API they serve.
//!
//! Every handler returns `Result<_, AppError>`; status mapping happens in
//! `AppError::into_response`.

pub mod account;
pub mod admin;
pub mod files;
pub mod invites;
pub mod support;

/// Trims an optional form/JSON value and drops it when nothing is left.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
