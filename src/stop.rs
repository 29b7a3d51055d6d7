//! Stop orders - market-price-reactive order types built on triggers.
//!
//! A [`Stop`] holds a payload (an order, or another trigger for
//! chained setups) and submits it the moment the last-trade price
//! crosses its threshold. A stop-limit is simply a stop whose payload
//! is a limit order; a plain stop carries a market order.
//!
//! A [`TrailingStop`] additionally tracks the market with a controller
//! trigger riding on the opposite side: every time the market walks
//! away from the stop, the controller fires, re-arms itself one
//! representable price step beyond the new market price, and ratchets
//! the stop's threshold to market-plus-offset (never loosening it).
//! When the stop finally fires it submits its payload and tears the
//! controller down.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::book::Book;
use crate::order::{Order, Side, MAX_PRICE, MIN_PRICE};
use crate::trigger::{Trigger, TriggerHandler};

/// How a trailing stop's offset is applied to the market price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetKind {
    /// Offset is an absolute price distance
    Absolute,
    /// Offset is a fraction of the market price
    Percent,
}

/// Something a firing trigger can submit into a book.
pub trait Payload {
    fn submit_to(&self, book: &Book);
}

impl Payload for Rc<Order> {
    fn submit_to(&self, book: &Book) {
        book.submit(self);
    }
}

impl Payload for Rc<Trigger> {
    fn submit_to(&self, book: &Book) {
        book.submit_trigger(self);
    }
}

/// Trigger handler that submits its payload once the threshold is
/// crossed.
///
/// A bid-side stop fires on falling last-trade prices, an ask-side
/// stop on rising ones. If the stop fires from inside a match, the
/// payload order is deferred and executes right after that match
/// completes.
pub struct Stop<P: Payload> {
    payload: P,
}

impl<P: Payload + 'static> Stop<P> {
    /// Build a stop resting at `price` on `side`.
    pub fn new(side: Side, price: f64, payload: P) -> Rc<Trigger> {
        Trigger::new(side, price, Self { payload })
    }
}

impl<P: Payload> TriggerHandler for Stop<P> {
    fn on_triggered(&self, trigger: &Rc<Trigger>) {
        if let Some(book) = trigger.book() {
            self.payload.submit_to(&book);
        }
    }
}

/// Trigger handler that keeps its threshold trailing the market.
///
/// The offset is applied away from the stop: a bid-side stop trails
/// below a rising market at `market - offset`, an ask-side stop above
/// a falling market at `market + offset` (or the `Percent`
/// equivalents). The threshold only ever tightens toward the market.
pub struct TrailingStop<P: Payload> {
    offset_kind: OffsetKind,
    offset: f64,
    payload: P,
    controller: RefCell<Option<Rc<Trigger>>>,
    armed: Cell<bool>,
}

impl<P: Payload + 'static> TrailingStop<P> {
    /// Build a trailing stop resting at `price` on `side`.
    ///
    /// On a book that has never traded the controller arms itself on
    /// the first trade; otherwise it rests one price step beyond the
    /// current market price.
    pub fn new(
        side: Side,
        price: f64,
        offset_kind: OffsetKind,
        offset: f64,
        payload: P,
    ) -> Rc<Trigger> {
        Trigger::new(
            side,
            price,
            Self {
                offset_kind,
                offset,
                payload,
                controller: RefCell::new(None),
                armed: Cell::new(false),
            },
        )
    }
}

impl<P: Payload> TriggerHandler for TrailingStop<P> {
    fn on_queued(&self, trigger: &Rc<Trigger>) {
        if self.armed.get() {
            return;
        }
        self.armed.set(true);

        let Some(book) = trigger.book() else {
            return;
        };
        let market = book.last_trade_price();

        // The controller reacts to the price motion opposite the
        // stop's, so it rides on the other side of the book.
        let (controller_side, controller_price) = match trigger.side() {
            Side::Bid => (Side::Ask, market.map(f64::next_up).unwrap_or(MIN_PRICE)),
            Side::Ask => (Side::Bid, market.map(f64::next_down).unwrap_or(MAX_PRICE)),
        };

        let controller = Trigger::new(
            controller_side,
            controller_price,
            Controller {
                offset_kind: self.offset_kind,
                offset: self.offset,
                stop: Rc::downgrade(trigger),
            },
        );
        *self.controller.borrow_mut() = Some(controller.clone());
        debug!(
            threshold = trigger.price(),
            controller = controller_price,
            "trailing stop armed"
        );
        book.submit_trigger(&controller);
    }

    fn on_triggered(&self, trigger: &Rc<Trigger>) {
        if let Some(book) = trigger.book() {
            self.payload.submit_to(&book);
        }
        if let Some(controller) = self.controller.borrow_mut().take() {
            controller.cancel();
        }
    }

    fn on_canceled(&self, _trigger: &Rc<Trigger>) {
        self.armed.set(false);
        if let Some(controller) = self.controller.borrow_mut().take() {
            controller.cancel();
        }
    }
}

/// The tracker half of a trailing stop. Each fire re-arms it one
/// price step beyond the new market price and ratchets the stop's
/// threshold.
struct Controller {
    offset_kind: OffsetKind,
    offset: f64,
    stop: Weak<Trigger>,
}

impl TriggerHandler for Controller {
    fn on_triggered(&self, trigger: &Rc<Trigger>) {
        let Some(book) = trigger.book() else {
            return;
        };
        // Only a trade can fire a trigger, so a market price exists
        let Some(market) = book.last_trade_price() else {
            return;
        };
        let Some(stop) = self.stop.upgrade() else {
            return;
        };

        // An ask-side controller pairs with a bid-side stop trailing
        // below the market, and vice versa.
        let (rearm, threshold) = match trigger.side() {
            Side::Ask => {
                let tightened = match self.offset_kind {
                    OffsetKind::Absolute => market - self.offset,
                    OffsetKind::Percent => market * (1.0 - self.offset),
                };
                (market.next_up(), tightened.max(stop.price()))
            }
            Side::Bid => {
                let tightened = match self.offset_kind {
                    OffsetKind::Absolute => market + self.offset,
                    OffsetKind::Percent => market * (1.0 + self.offset),
                };
                (market.next_down(), tightened.min(stop.price()))
            }
        };

        debug!(market, threshold, "trailing stop tightened");
        trigger.set_price(rearm);
        stop.set_price(threshold);
    }
}
