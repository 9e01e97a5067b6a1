// handlers/admin/mod.rs - Admin handlers (session cookie + admin role required)
//
// Every handler authorizes through AppState::gate before doing any work.
// Route Prefix: /api/admin/*

pub mod users;

pub use users::*;
