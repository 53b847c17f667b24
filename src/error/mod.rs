mod app;
mod config;
mod poll;
mod transport;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use poll::PollError;
pub use transport::TransportError;
pub use validation::ValidationError;
