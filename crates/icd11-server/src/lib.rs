pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod server;

pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, Icd11Gateway, ServerBuilder, build_app, build_service, router};
