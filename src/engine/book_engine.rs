use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::command::{Command, ReadError, read_commands};
use crate::error::BookError;
use crate::matching::{AddOutcome, BookSnapshot, OrderBook};
use crate::metrics::{FILLED_QUANTITY, FILLS, ORDERS_ACCEPTED, ORDERS_CANCELED, ORDERS_REJECTED, RESTING_ORDERS};
use crate::models::{Event, EventEnvelope, Order, OrderId, OrderView, Price, Quantity, Sequence, Side};

/// Serializable view of everything resting on the book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookState {
    pub engine_seq: u64,
    pub next_order_seq: Sequence,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub commands: usize,
    pub rejected: usize,
    pub unparsable: usize,
}

impl ReplaySummary {
    /// Counts one applied command and any rejection among its events.
    pub fn record(&mut self, envelopes: &[EventEnvelope]) {
        self.commands += 1;
        self.rejected += envelopes
            .iter()
            .filter(|envelope| matches!(envelope.event, Event::Rejected { .. }))
            .count();
    }
}

/// Applies commands to one book, one at a time.
#[derive(Debug, Default)]
pub struct Engine {
    book: OrderBook,
    engine_seq: u64,
}

/// Range check for raw ADD parameters: id, price and quantity must all be
/// strictly positive. Id 0 is reserved and never names an order.
pub fn validate_order_params(id: OrderId, price: i64, quantity: i64) -> Result<(Price, Quantity), BookError> {
    match (Price::try_from(price), Quantity::try_from(quantity)) {
        (Ok(p), Ok(q)) if id > 0 && p > 0 && q > 0 => Ok((p, q)),
        _ => Err(BookError::InvalidOrderParameters { id, price, quantity }),
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Number of commands applied so far, rejected ones included.
    pub fn engine_seq(&self) -> u64 {
        self.engine_seq
    }

    pub fn add_order(&mut self, id: OrderId, side: Side, price: i64, quantity: i64) -> Result<AddOutcome, BookError> {
        self.engine_seq += 1;
        let result = validate_order_params(id, price, quantity)
            .and_then(|(price, quantity)| self.book.add_order(Order::new(id, side, price, quantity)));
        match &result {
            Ok(outcome) => {
                metrics::counter!(ORDERS_ACCEPTED).increment(1);
                for fill in outcome.fills() {
                    debug!(
                        maker_order_id = fill.maker_order_id,
                        taker_order_id = fill.taker_order_id,
                        price = fill.price,
                        quantity = fill.quantity,
                        "fill"
                    );
                }
                if !outcome.fills().is_empty() {
                    metrics::counter!(FILLS).increment(outcome.fills().len() as u64);
                    metrics::counter!(FILLED_QUANTITY).increment(outcome.filled_quantity());
                }
                if outcome.remaining() > 0 {
                    debug!(order_id = id, %side, price, remaining = outcome.remaining(), "order rested");
                }
            }
            Err(err) => self.record_rejection(id, err),
        }
        self.record_depth();
        result
    }

    pub fn cancel_order(&mut self, id: OrderId) -> Result<OrderView, BookError> {
        self.engine_seq += 1;
        let result = self.book.cancel_order(id);
        match &result {
            Ok(order) => {
                metrics::counter!(ORDERS_CANCELED).increment(1);
                debug!(order_id = id, remaining = order.remaining, "order canceled");
            }
            Err(err) => self.record_rejection(id, err),
        }
        self.record_depth();
        result
    }

    /// Applies one command and describes what happened as events.
    #[instrument(skip(self))]
    pub fn handle_command(&mut self, command: Command) -> Vec<EventEnvelope> {
        let events = match command {
            Command::Add {
                id,
                side,
                price,
                quantity,
            } => match self.add_order(id, side, price, quantity) {
                Ok(outcome) => add_events(side, price, quantity, &outcome),
                Err(err) => vec![rejected(id, &err)],
            },
            Command::Cancel { id } => match self.cancel_order(id) {
                Ok(order) => vec![Event::Canceled {
                    order_id: id,
                    remaining: order.remaining,
                }],
                Err(err) => vec![rejected(id, &err)],
            },
        };
        events
            .into_iter()
            .map(|event| EventEnvelope {
                engine_seq: self.engine_seq,
                event,
            })
            .collect()
    }

    /// Feeds every command in `reader` through the engine. Unparsable lines are
    /// logged and skipped; read failures stop the replay.
    pub fn replay<R, F>(&mut self, reader: R, mut on_event: F) -> Result<ReplaySummary, ReadError>
    where
        R: BufRead,
        F: FnMut(&EventEnvelope),
    {
        let mut summary = ReplaySummary::default();
        for item in read_commands(reader) {
            let (line, command) = match item {
                Ok(parsed) => parsed,
                Err(ReadError::Parse { line, source }) => {
                    warn!(line, error = %source, "skipping unparsable command");
                    summary.unparsable += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            debug!(line, ?command, "applying command");
            let envelopes = self.handle_command(command);
            summary.record(&envelopes);
            for envelope in &envelopes {
                on_event(envelope);
            }
        }
        Ok(summary)
    }

    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        self.book.snapshot(depth)
    }

    pub fn state(&self) -> BookState {
        BookState {
            engine_seq: self.engine_seq,
            next_order_seq: self.book.next_seq(),
            orders: self.book.orders(),
        }
    }

    pub fn state_hash(&self) -> anyhow::Result<blake3::Hash> {
        let bytes = bincode::serialize(&self.state())?;
        Ok(blake3::hash(&bytes))
    }

    fn record_rejection(&self, id: OrderId, err: &BookError) {
        warn!(order_id = id, reason = err.code(), "{err}");
        metrics::counter!(ORDERS_REJECTED, "reason" => err.code()).increment(1);
    }

    fn record_depth(&self) {
        metrics::gauge!(RESTING_ORDERS).set(self.book.len() as f64);
    }
}

fn add_events(side: Side, price: i64, quantity: i64, outcome: &AddOutcome) -> Vec<Event> {
    let order_id = outcome.order_id();
    // Both values passed validation before the book accepted the order.
    let (price, quantity) = (price.unsigned_abs(), quantity.unsigned_abs());
    let mut events = Vec::with_capacity(outcome.fills().len() + 2);
    events.push(Event::Accepted {
        order_id,
        side,
        price,
        quantity,
    });
    events.extend(outcome.fills().iter().copied().map(Event::Fill));
    if outcome.remaining() > 0 {
        events.push(Event::Rested {
            order_id,
            side,
            price,
            quantity: outcome.remaining(),
        });
    }
    events
}

fn rejected(order_id: OrderId, err: &BookError) -> Event {
    Event::Rejected {
        order_id,
        reason: err.code().to_string(),
        message: err.to_string(),
    }
}
