pub mod error;
pub mod models;
pub mod providers;
pub mod services;

pub use error::*;
pub use models::*;
pub use providers::*;
pub use services::*;
