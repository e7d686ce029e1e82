/*
 * Responsibility
 * - crate の module 構成 (binary と integration tests の両方から使う)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
