//! Fuzz tests - seeded random operation streams.
//!
//! One test drives the full order-type mix and asserts the book's
//! internal invariants throughout; the other compares best prices
//! against a naive but correct reference book on plain limit flows.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use reflex_lob::{Book, Order, Side, MAX_PRICE, MIN_PRICE};

fn random_side(rng: &mut ChaCha8Rng) -> Side {
    if rng.gen_bool(0.5) {
        Side::Bid
    } else {
        Side::Ask
    }
}

/// Integral prices and quantities keep the aggregates exact.
fn random_order(rng: &mut ChaCha8Rng) -> Rc<Order> {
    let side = random_side(rng);
    let price = rng.gen_range(90..=110) as f64;
    let quantity = rng.gen_range(1..=100) as f64;

    let mut builder = Order::builder(side, price, quantity);
    if rng.gen_bool(0.1) {
        builder = builder.immediate_or_cancel();
    }
    if rng.gen_bool(0.15) {
        builder = builder.all_or_nothing();
    }
    builder.build()
}

#[test]
fn fuzz_invariants_hold() {
    const SEED: u64 = 0xFEEDFACE;
    const OPS: usize = 4_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let book = Book::new();
    let mut active: Vec<Rc<Order>> = Vec::new();

    for i in 0..OPS {
        active.retain(|order| order.is_queued());

        let roll = rng.gen_range(0..10);
        if active.is_empty() || roll < 6 {
            let order = random_order(&mut rng);
            book.submit(&order);
            if order.is_queued() {
                active.push(order);
            }
        } else if roll < 8 {
            let idx = rng.gen_range(0..active.len());
            let order = active.swap_remove(idx);
            assert!(order.cancel());
            assert!(!order.is_queued());
        } else {
            let idx = rng.gen_range(0..active.len());
            let quantity = rng.gen_range(1..=120) as f64;
            active[idx].set_quantity(quantity);
        }

        if i % 10 == 0 {
            book.audit();
        }
    }

    book.audit();

    // Every order the engine still claims as queued really rests at
    // its price, and vice versa
    for order in &active {
        if order.is_queued() {
            let level = book.level_at(order.side(), order.price()).unwrap();
            assert!(level.quantity + level.aon_quantity >= order.quantity());
        }
    }

    println!("Fuzz invariants passed over {OPS} operations");
}

/// Simple reference implementation for verification: plain limit
/// orders only, aggregated per price level.
struct ReferenceBook {
    bids: BTreeMap<i64, Vec<(u64, f64)>>, // price -> [(order_id, qty)]
    asks: BTreeMap<i64, Vec<(u64, f64)>>,
}

impl ReferenceBook {
    fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn best_bid(&self) -> Option<i64> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<i64> {
        self.asks.keys().next().copied()
    }

    fn place(&mut self, order_id: u64, side: Side, price: i64, mut qty: f64) {
        match side {
            Side::Bid => {
                let crossing: Vec<i64> = self
                    .asks
                    .range(..=price)
                    .map(|(&level, _)| level)
                    .collect();
                for level in crossing {
                    if qty <= 0.0 {
                        break;
                    }
                    let orders = self.asks.get_mut(&level).unwrap();
                    while let Some(front) = orders.first_mut() {
                        if qty <= 0.0 {
                            break;
                        }
                        let traded = front.1.min(qty);
                        front.1 -= traded;
                        qty -= traded;
                        if front.1 <= 0.0 {
                            orders.remove(0);
                        }
                    }
                    if orders.is_empty() {
                        self.asks.remove(&level);
                    }
                }
                if qty > 0.0 {
                    self.bids.entry(price).or_default().push((order_id, qty));
                }
            }
            Side::Ask => {
                let crossing: Vec<i64> = self
                    .bids
                    .range(price..)
                    .rev()
                    .map(|(&level, _)| level)
                    .collect();
                for level in crossing {
                    if qty <= 0.0 {
                        break;
                    }
                    let orders = self.bids.get_mut(&level).unwrap();
                    while let Some(front) = orders.first_mut() {
                        if qty <= 0.0 {
                            break;
                        }
                        let traded = front.1.min(qty);
                        front.1 -= traded;
                        qty -= traded;
                        if front.1 <= 0.0 {
                            orders.remove(0);
                        }
                    }
                    if orders.is_empty() {
                        self.bids.remove(&level);
                    }
                }
                if qty > 0.0 {
                    self.asks.entry(price).or_default().push((order_id, qty));
                }
            }
        }
    }

    fn cancel(&mut self, order_id: u64, side: Side, price: i64) {
        let book = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if let Some(orders) = book.get_mut(&price) {
            orders.retain(|(id, _)| *id != order_id);
            if orders.is_empty() {
                book.remove(&price);
            }
        }
    }
}

#[test]
fn fuzz_best_prices_match_reference() {
    const SEED: u64 = 0xBADC0DE;
    const OPS: usize = 6_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let book = Book::new();
    let mut reference = ReferenceBook::new();
    let mut active: Vec<(u64, Rc<Order>)> = Vec::new();
    let mut next_order_id = 1u64;

    for i in 0..OPS {
        active.retain(|(_, order)| order.is_queued());

        // 70% place, 30% cancel
        if active.is_empty() || rng.gen_bool(0.7) {
            let side = random_side(&mut rng);
            let price = rng.gen_range(9800..10200);
            let qty = rng.gen_range(1..200) as f64;
            let order_id = next_order_id;
            next_order_id += 1;

            let order = Order::limit(side, price as f64, qty);
            book.submit(&order);
            reference.place(order_id, side, price, qty);
            if order.is_queued() {
                active.push((order_id, order));
            }
        } else {
            let idx = rng.gen_range(0..active.len());
            let (order_id, order) = active.swap_remove(idx);
            reference.cancel(order_id, order.side(), order.price() as i64);
            assert!(order.cancel());
        }

        let expected_bid = reference.best_bid().map(|p| p as f64).unwrap_or(MIN_PRICE);
        let expected_ask = reference.best_ask().map(|p| p as f64).unwrap_or(MAX_PRICE);
        assert_eq!(
            book.best_bid(),
            expected_bid,
            "best bid mismatch at op {i}"
        );
        assert_eq!(
            book.best_ask(),
            expected_ask,
            "best ask mismatch at op {i}"
        );
    }

    book.audit();
    println!("Reference comparison passed over {OPS} operations");
}
