// handlers/mod.rs - HTTP handlers
//
// Public (no auth): /, /health — defined next to the router in lib.rs
// Admin (session cookie + admin role): /api/admin/*

pub mod admin;

pub use admin::*;
