pub mod api;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod service;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{KgserveError, Result};
pub use service::{FalkorGraphRag, GraphRag};
