//! Planboard HTTP and WebSocket server
//!
//! [`app::build_router`] assembles the `/v1` REST surface, the `/ws`
//! realtime gateways and `/health` over an [`app::AppState`]. Handlers live
//! in [`routes`]; the side effects every mutation shares (activity rows and
//! user notifications) live in [`services`]. Uploads and outgoing mail sit
//! behind the [`storage::ObjectStore`] and [`mail::Mailer`] seams.

pub mod app;
pub mod config;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod storage;
