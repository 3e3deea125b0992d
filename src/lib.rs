pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
pub mod models;
pub mod output;

pub mod metrics;

pub use error::BookError;
pub use matching::{AddOutcome, OrderBook};
pub use models::{Event, EventEnvelope, Fill, LevelQuantity, Order, OrderId, OrderView, Price, Quantity, Side};
