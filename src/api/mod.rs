//! HTTP surface: handlers, routing and middleware, OpenAPI document.

pub mod doc;
pub mod handlers;
pub mod routes;
pub mod state;
