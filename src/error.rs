use crate::models::OrderId;

/// Rejections reported by the book. None of them leave the book modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("order {0} does not exist")]
    UnknownOrder(OrderId),
    #[error("invalid order parameters: id {id}, price {price}, quantity {quantity}")]
    InvalidOrderParameters { id: OrderId, price: i64, quantity: i64 },
}

impl BookError {
    /// Stable label used in events and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateOrder(_) => "duplicate_order",
            Self::UnknownOrder(_) => "unknown_order",
            Self::InvalidOrderParameters { .. } => "invalid_order_parameters",
        }
    }
}
