//! HTTP transport: server, admission middleware, and handlers.

pub mod handlers;
pub mod middleware;
mod server;

pub use server::HttpServer;
