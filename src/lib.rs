pub mod actions;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod event_queue;
pub mod events;
pub mod peers;
pub mod server;
pub mod service;
pub mod utils;

pub use context::RequestContext;
pub use error::SubcastError;
