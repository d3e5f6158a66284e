//! HTTP server and application wiring

pub mod app;
pub mod http;

pub use app::{app, build_app, connect_store, initialize, initialize_with, App, MEMORY_STORE, MONGODB_STORE};
pub use http::{run, serve};
