/// Router Module Index
///
/// Routes are split by who may call them. Access control is applied per module with
/// Axum layers in `create_router`, so a handler cannot end up public by accident.

/// Routes open to anonymous callers.
pub mod public;

/// Routes behind the session check (`auth_middleware`).
pub mod authenticated;

/// Routes behind the session check and the admin capability (`admin_middleware`).
pub mod admin;
