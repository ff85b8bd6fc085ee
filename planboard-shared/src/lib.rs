//! Planboard domain layer
//!
//! Everything the API server needs below HTTP: the PostgreSQL schema and its
//! row types ([`models`]), pooling and migrations ([`db`]), and credentials,
//! tokens and permission rules ([`auth`]).

pub mod auth;
pub mod db;
pub mod models;
