/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: health check
/// - `auth`: register, login, refresh, logout, current user
/// - `users`: user administration and avatars
/// - `projects`, `tasks`, `subtasks`, `events`: planning entities
/// - `teams`, `members`: teams and their membership
/// - `notifications`: per-user notifications
/// - `activity_logs`: audit trail (admin)

pub mod activity_logs;
pub mod auth;
pub mod events;
pub mod health;
pub mod members;
pub mod notifications;
pub mod projects;
pub mod subtasks;
pub mod tasks;
pub mod teams;
pub mod users;

use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::error::{validation_error, ApiResult};

/// Runs `validator` rules on a request body
pub(crate) fn validate<T: Validate>(req: &T) -> ApiResult<()> {
    req.validate().map_err(validation_error)
}

/// Distinguishes an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
