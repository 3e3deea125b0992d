use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::BookError;
use crate::matching::AddOutcome;
use crate::models::{Fill, LevelQuantity, Order, OrderId, OrderView, Price, Quantity, Sequence, Side};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: LevelQuantity,
    pub orders: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone)]
struct OrderNode {
    order_id: OrderId,
    side: Side,
    price: Price,
    remaining: Quantity,
    seq: Sequence,
    next: Option<usize>,
    prev: Option<usize>,
}

impl OrderNode {
    fn view(&self) -> OrderView {
        OrderView {
            order_id: self.order_id,
            side: self.side,
            price: self.price,
            remaining: self.remaining,
            seq: self.seq,
        }
    }
}

/// FIFO queue of arena slots sharing one price. Head is the oldest order.
#[derive(Debug, Default)]
struct Level {
    head: Option<usize>,
    tail: Option<usize>,
    total_qty: LevelQuantity,
    order_count: usize,
}

/// Single-instrument limit order book with price-time priority.
///
/// Resting orders live in a slab arena and each price level threads a doubly
/// linked list through it, so cancelling by id is a hash lookup plus an unlink.
/// Bids and asks are both keyed ascending; the best bid is the last key.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<Price, Level>,
    asks: BTreeMap<Price, Level>,
    orders: slab::Slab<OrderNode>,
    order_index: HashMap<OrderId, usize>,
    next_seq: Sequence,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(orders: usize) -> Self {
        Self {
            orders: slab::Slab::with_capacity(orders),
            order_index: HashMap::with_capacity(orders),
            ..Self::default()
        }
    }

    /// Matches `order` against the opposite side while it crosses, then rests
    /// whatever is left at the order's own limit price.
    pub fn add_order(&mut self, order: Order) -> Result<AddOutcome, BookError> {
        if order.id == 0 || order.price == 0 || order.quantity == 0 {
            return Err(BookError::InvalidOrderParameters {
                id: order.id,
                price: i64::try_from(order.price).unwrap_or(i64::MAX),
                quantity: i64::try_from(order.quantity).unwrap_or(i64::MAX),
            });
        }
        if self.order_index.contains_key(&order.id) {
            return Err(BookError::DuplicateOrder(order.id));
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let mut fills = Vec::new();
        let mut remaining = order.quantity;
        if self.would_cross(order.side, order.price) {
            remaining = self.match_against_book(&order, &mut fills);
        }

        if remaining == 0 {
            return Ok(AddOutcome::Filled {
                order_id: order.id,
                fills,
            });
        }

        self.add_resting(&order, remaining, seq);
        if fills.is_empty() {
            Ok(AddOutcome::Rested {
                order_id: order.id,
                remaining,
            })
        } else {
            Ok(AddOutcome::PartiallyFilled {
                order_id: order.id,
                remaining,
                fills,
            })
        }
    }

    /// Removes a resting order and returns it as it stood.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<OrderView, BookError> {
        let Some(idx) = self.order_index.remove(&order_id) else {
            return Err(BookError::UnknownOrder(order_id));
        };
        let node = self.orders.remove(idx);
        self.detach_from_level(idx, &node);
        Ok(node.view())
    }

    pub fn has_order(&self, order_id: OrderId) -> bool {
        self.order_index.contains_key(&order_id)
    }

    pub fn order(&self, order_id: OrderId) -> Option<OrderView> {
        let idx = *self.order_index.get(&order_id)?;
        self.orders.get(idx).map(OrderNode::view)
    }

    pub fn len(&self) -> usize {
        self.order_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_index.is_empty()
    }

    pub fn level_count(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Sequence number the next accepted order will receive.
    pub fn next_seq(&self) -> Sequence {
        self.next_seq
    }

    pub fn best_bid(&self) -> Option<(Price, LevelQuantity)> {
        self.bids
            .last_key_value()
            .map(|(price, level)| (*price, level.total_qty))
    }

    pub fn best_ask(&self) -> Option<(Price, LevelQuantity)> {
        self.asks
            .first_key_value()
            .map(|(price, level)| (*price, level.total_qty))
    }

    pub fn spread(&self) -> Option<Price> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        Some(ask.saturating_sub(bid))
    }

    /// Top `depth` levels of one side in priority order.
    pub fn depth(&self, side: Side, depth: usize) -> Vec<BookLevel> {
        let to_level = |(price, level): (&Price, &Level)| BookLevel {
            price: *price,
            quantity: level.total_qty,
            orders: level.order_count,
        };
        match side {
            Side::Buy => self.bids.iter().rev().take(depth).map(to_level).collect(),
            Side::Sell => self.asks.iter().take(depth).map(to_level).collect(),
        }
    }

    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.depth(Side::Buy, depth),
            asks: self.depth(Side::Sell, depth),
        }
    }

    /// Resting orders at one price, oldest first.
    pub fn level_orders(&self, side: Side, price: Price) -> Vec<OrderView> {
        let Some(level) = self.levels(side).get(&price) else {
            return Vec::new();
        };
        self.walk(level).map(OrderNode::view).collect()
    }

    /// Every resting order: bids best-first, then asks best-first, FIFO within a level.
    pub fn orders(&self) -> Vec<OrderView> {
        let mut out = Vec::with_capacity(self.len());
        for level in self.bids.values().rev() {
            out.extend(self.walk(level).map(OrderNode::view));
        }
        for level in self.asks.values() {
            out.extend(self.walk(level).map(OrderNode::view));
        }
        out
    }

    pub fn would_cross(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.asks.keys().next().is_some_and(|best| price >= *best),
            Side::Sell => self.bids.keys().next_back().is_some_and(|best| price <= *best),
        }
    }

    /// Verifies the structural invariants of the book. Intended for tests and
    /// debug tooling; walks every order.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = 0usize;
        for side in [Side::Buy, Side::Sell] {
            for (price, level) in self.levels(side) {
                if level.order_count == 0 || level.head.is_none() {
                    return Err(format!("{side} level {price} is empty"));
                }
                let mut prev: Option<usize> = None;
                let mut last_seq: Option<Sequence> = None;
                let mut count = 0usize;
                let mut total: LevelQuantity = 0;
                let mut cursor = level.head;
                while let Some(idx) = cursor {
                    let Some(node) = self.orders.get(idx) else {
                        return Err(format!("{side} level {price} links to vacant slot {idx}"));
                    };
                    if node.side != side || node.price != *price {
                        return Err(format!("order {} filed under {side} {price}", node.order_id));
                    }
                    if node.prev != prev {
                        return Err(format!("order {} has a broken back link", node.order_id));
                    }
                    if node.remaining == 0 {
                        return Err(format!("order {} rests with zero quantity", node.order_id));
                    }
                    if last_seq.is_some_and(|seq| seq >= node.seq) {
                        return Err(format!("order {} is out of arrival order", node.order_id));
                    }
                    if self.order_index.get(&node.order_id) != Some(&idx) {
                        return Err(format!("order {} is missing from the index", node.order_id));
                    }
                    last_seq = Some(node.seq);
                    count += 1;
                    total += LevelQuantity::from(node.remaining);
                    prev = Some(idx);
                    cursor = node.next;
                }
                if level.tail != prev {
                    return Err(format!("{side} level {price} tail is stale"));
                }
                if count != level.order_count || total != level.total_qty {
                    return Err(format!(
                        "{side} level {price} caches {} orders / {} qty, holds {count} / {total}",
                        level.order_count, level.total_qty
                    ));
                }
                seen += count;
            }
        }
        if seen != self.orders.len() || seen != self.order_index.len() {
            return Err(format!(
                "{seen} orders on levels, {} in arena, {} indexed",
                self.orders.len(),
                self.order_index.len()
            ));
        }
        if let (Some((bid, _)), Some((ask, _))) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(format!("book is crossed: bid {bid} >= ask {ask}"));
            }
        }
        Ok(())
    }

    fn match_against_book(&mut self, taker: &Order, fills: &mut Vec<Fill>) -> Quantity {
        let maker_side = taker.side.opposite();
        let mut remaining = taker.quantity;

        while remaining > 0 {
            let best_price = match maker_side {
                Side::Buy => self.bids.keys().next_back().copied(),
                Side::Sell => self.asks.keys().next().copied(),
            };
            let Some(price) = best_price else {
                break;
            };
            if !crosses(taker.side, taker.price, price) {
                break;
            }

            let levels = match maker_side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let Some(level) = levels.get_mut(&price) else {
                break;
            };

            while remaining > 0 {
                let Some(head_idx) = level.head else {
                    break;
                };
                let maker = &mut self.orders[head_idx];
                let trade_qty = remaining.min(maker.remaining);
                maker.remaining -= trade_qty;
                level.total_qty -= LevelQuantity::from(trade_qty);
                remaining -= trade_qty;

                fills.push(Fill {
                    maker_order_id: maker.order_id,
                    taker_order_id: taker.id,
                    price,
                    quantity: trade_qty,
                    maker_remaining: maker.remaining,
                });

                if maker.remaining == 0 {
                    let maker_id = maker.order_id;
                    let next = maker.next;
                    self.orders.remove(head_idx);
                    self.order_index.remove(&maker_id);
                    level.head = next;
                    level.order_count -= 1;
                    match next {
                        Some(next_idx) => self.orders[next_idx].prev = None,
                        None => level.tail = None,
                    }
                }
            }

            if level.head.is_none() {
                levels.remove(&price);
            }
        }

        remaining
    }

    fn add_resting(&mut self, order: &Order, remaining: Quantity, seq: Sequence) {
        let level = match order.side {
            Side::Buy => self.bids.entry(order.price).or_default(),
            Side::Sell => self.asks.entry(order.price).or_default(),
        };
        let idx = self.orders.insert(OrderNode {
            order_id: order.id,
            side: order.side,
            price: order.price,
            remaining,
            seq,
            next: None,
            prev: level.tail,
        });
        match level.tail {
            Some(tail) => self.orders[tail].next = Some(idx),
            None => level.head = Some(idx),
        }
        level.tail = Some(idx);
        level.total_qty += LevelQuantity::from(remaining);
        level.order_count += 1;
        self.order_index.insert(order.id, idx);
    }

    // `node` has already been taken out of the arena; only its neighbours and
    // the level bookkeeping are touched here.
    fn detach_from_level(&mut self, idx: usize, node: &OrderNode) {
        let levels = match node.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let Some(level) = levels.get_mut(&node.price) else {
            return;
        };
        if level.head == Some(idx) {
            level.head = node.next;
        }
        if level.tail == Some(idx) {
            level.tail = node.prev;
        }
        if let Some(prev) = node.prev {
            self.orders[prev].next = node.next;
        }
        if let Some(next) = node.next {
            self.orders[next].prev = node.prev;
        }
        level.total_qty -= LevelQuantity::from(node.remaining);
        level.order_count -= 1;
        if level.order_count == 0 {
            levels.remove(&node.price);
        }
    }

    fn levels(&self, side: Side) -> &BTreeMap<Price, Level> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn walk<'a>(&'a self, level: &Level) -> impl Iterator<Item = &'a OrderNode> + 'a {
        let mut cursor = level.head;
        std::iter::from_fn(move || {
            let node = self.orders.get(cursor?)?;
            cursor = node.next;
            Some(node)
        })
    }
}

fn crosses(taker_side: Side, limit_price: Price, best_price: Price) -> bool {
    match taker_side {
        Side::Buy => limit_price >= best_price,
        Side::Sell => limit_price <= best_price,
    }
}
