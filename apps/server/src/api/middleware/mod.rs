//! Middleware - request id propagation and tower-http layer factories

pub mod layers;
pub mod request_id;

pub use layers::{compression, cors};
pub use request_id::request_id_middleware;
