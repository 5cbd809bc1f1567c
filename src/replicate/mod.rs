pub mod client;
pub mod error;
pub mod types;

pub use client::{API_URL, JobClient, ReplicateClient};
pub use error::ReplicateError;
pub use types::PredictionResponse;
