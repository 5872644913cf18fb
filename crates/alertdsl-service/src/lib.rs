//! alertdsl service - the notification entry point, its configuration and
//! the HTTP surface in front of it.

pub mod config;
pub mod server;
pub mod service;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig};
pub use server::{router, serve, NotifyRequest};
pub use service::{DslScriptService, RunReport, RunState};
