pub mod orderbook;

use serde::{Deserialize, Serialize};

use crate::models::{Fill, OrderId, Quantity};

pub use orderbook::{BookLevel, BookSnapshot, OrderBook};

/// Result of a successful `add_order`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AddOutcome {
    /// Nothing crossed; the whole order rests.
    Rested { order_id: OrderId, remaining: Quantity },
    /// Some quantity traded and the remainder rests at the order's limit price.
    PartiallyFilled {
        order_id: OrderId,
        remaining: Quantity,
        fills: Vec<Fill>,
    },
    /// Fully consumed by resting liquidity; nothing rests.
    Filled { order_id: OrderId, fills: Vec<Fill> },
}

impl AddOutcome {
    pub fn order_id(&self) -> OrderId {
        match *self {
            Self::Rested { order_id, .. }
            | Self::PartiallyFilled { order_id, .. }
            | Self::Filled { order_id, .. } => order_id,
        }
    }

    pub fn fills(&self) -> &[Fill] {
        match self {
            Self::Rested { .. } => &[],
            Self::PartiallyFilled { fills, .. } | Self::Filled { fills, .. } => fills,
        }
    }

    /// Quantity left resting on the book after the add.
    pub fn remaining(&self) -> Quantity {
        match *self {
            Self::Rested { remaining, .. } | Self::PartiallyFilled { remaining, .. } => remaining,
            Self::Filled { .. } => 0,
        }
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.fills().iter().map(|fill| fill.quantity).sum()
    }
}
