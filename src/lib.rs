//! # reflex-lob
//!
//! A reactive, in-memory limit order book matching engine with
//! price-time priority.
//!
//! ## Design Principles
//!
//! - **Single-Threaded Per Book**: one thread owns a book; no locks,
//!   no atomics. Independent books may run on independent threads.
//! - **Embedded Library**: no I/O of its own. All outcomes surface as
//!   synchronous callbacks on the submitting thread.
//! - **Re-entrant Callbacks**: handlers may submit, cancel, and
//!   mutate orders mid-flight; nested submissions are deferred FIFO
//!   until the enclosing operation completes.
//! - **O(1) Book Mutations**: intrusive arena-backed queues give
//!   constant-time insert, cancel, and fill at a level.
//!
//! ## Order Types
//!
//! - **Limit** orders, good-till-cancel by default; market orders are
//!   limits at the price sentinels ([`MIN_PRICE`] / [`MAX_PRICE`])
//! - **Immediate-or-Cancel**: any residual cancels instead of resting
//! - **All-or-None**: trades only in its entirety, parked until a
//!   fillability probe says the opposite side can absorb it whole
//! - **Triggers**: callbacks keyed to the last-trade price, the
//!   primitive under stop, stop-limit, and trailing-stop orders
//!
//! ## Example
//!
//! ```
//! use reflex_lob::{Book, Order, Side};
//!
//! let book = Book::new();
//! book.submit(&Order::limit(Side::Ask, 101.0, 50.0));
//! book.submit(&Order::limit(Side::Bid, 101.0, 20.0));
//!
//! assert_eq!(book.last_trade_price(), Some(101.0));
//! assert_eq!(book.level_at(Side::Ask, 101.0).unwrap().quantity, 30.0);
//! ```

mod arena;
pub mod book;
mod ladder;
pub mod order;
mod price_level;
pub mod stop;
pub mod trigger;
mod trigger_level;

// Re-exports for convenience
pub use book::{Book, LevelInfo};
pub use order::{Order, OrderBuilder, OrderHandler, Side, MAX_PRICE, MIN_PRICE};
pub use stop::{OffsetKind, Payload, Stop, TrailingStop};
pub use trigger::{Trigger, TriggerHandler};
