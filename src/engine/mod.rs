pub mod book_engine;
pub mod service;

pub use book_engine::{BookState, Engine, ReplaySummary, validate_order_params};
pub use service::{BookHandle, BookService, ServiceError};
