//! Alert status API service library.

pub mod aliases;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod upstream;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{bootstrap, Service, Shutdown};
