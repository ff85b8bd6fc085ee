/// Middleware modules for the API server
///
/// JWT authentication lives in `planboard_shared::auth::middleware` so the
/// gateway handlers can reuse the same token checks.

pub mod security;
