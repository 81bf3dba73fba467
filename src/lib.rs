pub mod api;
pub mod config;
pub mod error;
pub mod errors;
pub mod models;
pub mod text;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{InvocationError, Result};
pub use errors::AppError;
