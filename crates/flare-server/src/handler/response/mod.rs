//! Response bodies shared by handlers.

mod error_response;

pub use error_response::ErrorResponse;
