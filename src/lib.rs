pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod identity;
pub mod mapping;
pub mod plugin;
pub mod sample;
pub mod scheduler;
pub mod sensors;
pub mod session;

pub use config::Config;
pub use error::{AppError, MappingError, Result};
pub use plugin::{TickOutcome, WeheatPlugin};
