//! Order entity - the user-owned handle for a single order.
//!
//! An order is created through [`OrderBuilder`], shared as `Rc<Order>`,
//! and submitted to a [`Book`](crate::Book). Ownership is joint: while
//! the order rests, the book holds a strong handle inside its price
//! level and the order holds a weak reference back to the book, valid
//! only while resident or during a callback.
//!
//! Behavior is customized through the [`OrderHandler`] capability set;
//! every method has a no-op default, mirroring an order that just
//! trades silently.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::arena::{NodeIndex, NULL_INDEX};
use crate::book::{Book, BookShared};

/// Price of a market sell order; also what [`Book::best_bid`] returns
/// for an empty bid side.
pub const MIN_PRICE: f64 = 0.0;

/// Price of a market buy order; also what [`Book::best_ask`] returns
/// for an empty ask side.
pub const MAX_PRICE: f64 = f64::INFINITY;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Event callbacks supplied by an order.
///
/// All methods run synchronously on the submitting thread, after the
/// book has finished mutating its own state for the enclosing
/// operation. A callback may re-enter the book freely: nested
/// submissions are deferred until the outermost operation completes,
/// while `cancel`/`set_quantity`/`set_all_or_nothing` apply
/// immediately.
///
/// Receivers are `&self`; handlers that need mutable state use
/// interior mutability, which keeps nested dispatch safe.
pub trait OrderHandler {
    /// The order passed validation and is about to be matched.
    fn on_accepted(&self, _order: &Rc<Order>) {}

    /// The order was queued at its price level.
    fn on_queued(&self, _order: &Rc<Order>) {}

    /// The order was rejected: it was already queued, or its quantity
    /// was not positive. No state changed.
    fn on_rejected(&self, _order: &Rc<Order>) {}

    /// The order traded against `partner`. For each trade the resting
    /// side's callback fires first, then the incoming side's.
    fn on_traded(&self, _order: &Rc<Order>, _partner: &Rc<Order>) {}

    /// The order was canceled: it was immediate-or-cancel and left a
    /// residual after matching.
    fn on_canceled(&self, _order: &Rc<Order>) {}
}

/// The unit handler: an order with no behavior of its own.
impl OrderHandler for () {}

/// A single order: fixed identity (side, price, immediate-or-cancel)
/// plus mutable state (quantity, all-or-none flag, queued location).
///
/// Market orders are ordinary limit orders at the price sentinels:
/// [`MAX_PRICE`] buys and [`MIN_PRICE`] sells fall through the generic
/// matching walk and cross everything on the opposite side.
pub struct Order {
    side: Side,
    price: f64,
    quantity: Cell<f64>,
    immediate_or_cancel: bool,
    all_or_nothing: Cell<bool>,
    queued: Cell<bool>,
    /// Book the order currently belongs to. Set while resident and
    /// during callbacks, dangling-free thanks to the weak reference.
    book: RefCell<Weak<BookShared>>,
    /// In-level locator: arena slot of this order's queue node.
    node: Cell<NodeIndex>,
    handler: Box<dyn OrderHandler>,
    this: Weak<Order>,
}

impl Order {
    /// Start building an order.
    pub fn builder(side: Side, price: f64, quantity: f64) -> OrderBuilder {
        OrderBuilder {
            side,
            price,
            quantity,
            immediate_or_cancel: false,
            all_or_nothing: false,
            handler: Box::new(()),
        }
    }

    /// A plain good-till-cancel limit order with no handler.
    pub fn limit(side: Side, price: f64, quantity: f64) -> Rc<Order> {
        Self::builder(side, price, quantity).build()
    }

    /// A market order: a limit buy at [`MAX_PRICE`] or a limit sell at
    /// [`MIN_PRICE`]. With no crossing liquidity a good-till-cancel
    /// market order rests at its sentinel price like any other limit.
    pub fn market(side: Side, quantity: f64) -> Rc<Order> {
        let price = match side {
            Side::Bid => MAX_PRICE,
            Side::Ask => MIN_PRICE,
        };
        Self::builder(side, price, quantity).build()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The side the order trades on.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// The limit price, fixed at creation.
    #[inline]
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Remaining quantity. Strictly decreasing through trades; zero
    /// once fully filled.
    #[inline]
    pub fn quantity(&self) -> f64 {
        self.quantity.get()
    }

    /// Whether any residual is canceled instead of queued.
    #[inline]
    pub fn is_immediate_or_cancel(&self) -> bool {
        self.immediate_or_cancel
    }

    /// Whether the order may only trade in its entirety.
    #[inline]
    pub fn is_all_or_nothing(&self) -> bool {
        self.all_or_nothing.get()
    }

    /// Whether the order currently rests in a book. Queued orders can
    /// be canceled.
    #[inline]
    pub fn is_queued(&self) -> bool {
        self.queued.get()
    }

    /// The book the order was submitted to, if it is resident or a
    /// callback is in flight.
    pub fn book(&self) -> Option<Book> {
        self.book.borrow().upgrade().map(Book::from_shared)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Cancel the order. Only queued orders can be canceled.
    ///
    /// # Returns
    /// `true` if the order was removed from its book, `false` if it
    /// was not queued.
    pub fn cancel(&self) -> bool {
        if !self.queued.get() {
            return false;
        }
        match self.book() {
            Some(book) => book.cancel_order(self),
            None => false,
        }
    }

    /// Update the remaining quantity.
    ///
    /// Non-positive and unchanged values are ignored. For a queued
    /// order the level aggregates are adjusted, and:
    ///
    /// - growing a non-AON or AON order re-checks the opposite side's
    ///   all-or-none orders, which may now be fillable;
    /// - shrinking a queued AON order re-checks the order itself and
    ///   executes it in place when it became fillable.
    pub fn set_quantity(&self, quantity: f64) {
        if quantity <= 0.0 || quantity == self.quantity.get() {
            return;
        }
        if !self.queued.get() {
            self.quantity.set(quantity);
            return;
        }
        if let Some(book) = self.book() {
            book.update_order_quantity(&self.handle(), quantity);
        }
    }

    /// Flip the all-or-none flag.
    ///
    /// For a queued order this moves quantity between the level's
    /// aggregates and re-slots the order in the level's all-or-none
    /// index at the position preserving price-time priority.
    pub fn set_all_or_nothing(&self, all_or_nothing: bool) {
        if all_or_nothing == self.all_or_nothing.get() {
            return;
        }
        if !self.queued.get() {
            self.all_or_nothing.set(all_or_nothing);
            return;
        }
        if let Some(book) = self.book() {
            book.update_order_aon(self, all_or_nothing);
        } else {
            self.all_or_nothing.set(all_or_nothing);
        }
        debug!(
            price = self.price,
            all_or_nothing, "order all-or-none flag changed"
        );
    }

    // ========================================================================
    // Engine-internal state
    // ========================================================================

    /// Recover the shared handle; orders only exist behind `Rc`.
    pub(crate) fn handle(&self) -> Rc<Order> {
        self.this.upgrade().unwrap()
    }

    pub(crate) fn handler(&self) -> &dyn OrderHandler {
        self.handler.as_ref()
    }

    pub(crate) fn attach(&self, book: Weak<BookShared>) {
        *self.book.borrow_mut() = book;
    }

    pub(crate) fn detach(&self) {
        *self.book.borrow_mut() = Weak::new();
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.queued.set(queued);
    }

    pub(crate) fn node_index(&self) -> NodeIndex {
        self.node.get()
    }

    pub(crate) fn set_node(&self, index: NodeIndex) {
        self.node.set(index);
    }

    pub(crate) fn clear_node(&self) {
        self.node.set(NULL_INDEX);
    }

    /// Write the quantity without book bookkeeping; the caller has
    /// already settled the level aggregates.
    pub(crate) fn set_quantity_direct(&self, quantity: f64) {
        self.quantity.set(quantity);
    }

    pub(crate) fn set_all_or_nothing_direct(&self, all_or_nothing: bool) {
        self.all_or_nothing.set(all_or_nothing);
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("side", &self.side)
            .field("price", &self.price)
            .field("quantity", &self.quantity.get())
            .field("immediate_or_cancel", &self.immediate_or_cancel)
            .field("all_or_nothing", &self.all_or_nothing.get())
            .field("queued", &self.queued.get())
            .finish()
    }
}

/// Builder for [`Order`]; completes into a shared handle.
pub struct OrderBuilder {
    side: Side,
    price: f64,
    quantity: f64,
    immediate_or_cancel: bool,
    all_or_nothing: bool,
    handler: Box<dyn OrderHandler>,
}

impl OrderBuilder {
    /// Cancel any residual after matching instead of queueing it.
    pub fn immediate_or_cancel(mut self) -> Self {
        self.immediate_or_cancel = true;
        self
    }

    /// Only trade the order in its entirety.
    pub fn all_or_nothing(mut self) -> Self {
        self.all_or_nothing = true;
        self
    }

    /// Attach event callbacks.
    pub fn handler(mut self, handler: impl OrderHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Finish building, producing the shared handle.
    pub fn build(self) -> Rc<Order> {
        Rc::new_cyclic(|this| Order {
            side: self.side,
            price: self.price,
            quantity: Cell::new(self.quantity),
            immediate_or_cancel: self.immediate_or_cancel,
            all_or_nothing: Cell::new(self.all_or_nothing),
            queued: Cell::new(false),
            book: RefCell::new(Weak::new()),
            node: Cell::new(NULL_INDEX),
            handler: self.handler,
            this: this.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_builder_defaults() {
        let order = Order::limit(Side::Bid, 100.0, 10.0);
        assert_eq!(order.side(), Side::Bid);
        assert_eq!(order.price(), 100.0);
        assert_eq!(order.quantity(), 10.0);
        assert!(!order.is_immediate_or_cancel());
        assert!(!order.is_all_or_nothing());
        assert!(!order.is_queued());
        assert!(order.book().is_none());
    }

    #[test]
    fn test_builder_flags() {
        let order = Order::builder(Side::Ask, 101.0, 5.0)
            .immediate_or_cancel()
            .all_or_nothing()
            .build();
        assert!(order.is_immediate_or_cancel());
        assert!(order.is_all_or_nothing());
    }

    #[test]
    fn test_market_order_prices() {
        assert_eq!(Order::market(Side::Bid, 1.0).price(), MAX_PRICE);
        assert_eq!(Order::market(Side::Ask, 1.0).price(), MIN_PRICE);
    }

    #[test]
    fn test_cancel_unqueued_is_noop() {
        let order = Order::limit(Side::Bid, 100.0, 10.0);
        assert!(!order.cancel());
    }

    #[test]
    fn test_set_quantity_unqueued() {
        let order = Order::limit(Side::Bid, 100.0, 10.0);
        order.set_quantity(25.0);
        assert_eq!(order.quantity(), 25.0);

        // Non-positive updates are ignored
        order.set_quantity(0.0);
        order.set_quantity(-3.0);
        assert_eq!(order.quantity(), 25.0);
    }

    #[test]
    fn test_set_all_or_nothing_unqueued() {
        let order = Order::limit(Side::Ask, 100.0, 10.0);
        order.set_all_or_nothing(true);
        assert!(order.is_all_or_nothing());
        order.set_all_or_nothing(false);
        assert!(!order.is_all_or_nothing());
    }
}
