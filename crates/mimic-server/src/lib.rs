//! Mimic: a configuration-driven HTTP stub server.
//!
//! A JSON route table maps (HTTP method, exact resource path) pairs to
//! named response templates; each matched request renders its template
//! with the request itself as the data context. Both the route table and
//! the template registry are built once at startup and read-only for the
//! process lifetime.
//!
//! Module layout:
//! - `config`: the JSON route-table document
//! - `template`: template compilation, registry, and the render context
//! - `routes`: route table compilation and (method, path) lookup
//! - `server`: listener setup, accept loop, and the request handler
//! - `logging`: tracing subscriber initialization

pub mod config;
pub mod logging;
pub mod routes;
pub mod server;
pub mod template;
