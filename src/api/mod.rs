pub mod http;
pub mod types;

pub use http::{build_router, AppState, HttpServer};
