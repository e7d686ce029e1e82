/*
 * Responsibility
 * - middleware の公開インターフェース
 * - perimeter (security headers / CORS / http / security events / ip filter) と
 *   route 単位の auth (access / permission) を分けて置く
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod ip_filter;
pub mod security_events;
pub mod security_headers;
