pub mod config;
pub mod content_filter;
pub mod coupons;
pub mod error;
pub mod extractor;
pub mod generations;
pub mod payments;
pub mod provider;
pub mod quota;
pub mod routes;
pub mod users;

pub use error::{AppError, AppResult};
pub use routes::api_routes;
