//! API response envelope

pub mod response;

pub use response::ApiResponse;
