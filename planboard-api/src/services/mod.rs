/// Side effects that follow a successful mutation
///
/// - [`activity`]: append an activity log row and push it to admins
/// - [`notify`]: create a notification and push it to its recipient
///
/// Neither helper fails the request that triggered it: errors are logged.

pub mod activity;
pub mod notify;
