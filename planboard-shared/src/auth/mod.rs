/// Who the caller is and what they may touch
///
/// Passwords are Argon2id ([`password`]); sessions are HS256 access and
/// refresh tokens ([`jwt`]) that logout revokes through [`blacklist`]. The
/// axum guard in [`middleware`] turns a bearer token into an
/// [`middleware::AuthContext`], and [`authorization`] decides what that
/// context may do with a given row.

pub mod authorization;
pub mod blacklist;
pub mod jwt;
pub mod middleware;
pub mod password;
