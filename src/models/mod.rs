use std::fmt;

use serde::{Deserialize, Serialize};

pub type OrderId = u64;
pub type Price = u64;
pub type Quantity = u64;
/// Aggregate of many order quantities at one price; wider than `Quantity` so it cannot overflow.
pub type LevelQuantity = u128;
pub type Sequence = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming limit order as handed to the book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl Order {
    pub fn new(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            side,
            price,
            quantity,
        }
    }
}

/// A resting order as seen from outside the book. `remaining` only shrinks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderView {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub remaining: Quantity,
    pub seq: Sequence,
}

/// One execution between a resting maker and the incoming taker, at the maker's price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_remaining: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Accepted {
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    },
    Rejected {
        order_id: OrderId,
        reason: String,
        message: String,
    },
    Fill(Fill),
    Rested {
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    },
    Canceled {
        order_id: OrderId,
        remaining: Quantity,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub engine_seq: u64,
    pub event: Event,
}
