//! Trigger entity - a reactive primitive keyed to the last-trade price.
//!
//! A trigger is an event handler resting in the book: bid-side
//! triggers fire when the last-trade price falls to or below their
//! threshold, ask-side triggers when it rises to or above. They are
//! the building block for stop, stop-limit, and trailing-stop order
//! types (see [`crate::stop`]).
//!
//! Two deliberate asymmetries against orders: a trigger can move
//! itself to a different price level ([`Trigger::set_price`]), and
//! trigger submission is never deferred - triggers react to the price
//! the moment it moves, even from inside an enclosing match.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::arena::{NodeIndex, NULL_INDEX};
use crate::book::{Book, BookShared};
use crate::order::Side;

/// Event callbacks supplied by a trigger.
///
/// Same dispatch rules as [`crate::OrderHandler`]: synchronous, after
/// the book settled its state, free to re-enter the book.
pub trait TriggerHandler {
    /// The trigger is about to be queued or fired.
    fn on_accepted(&self, _trigger: &Rc<Trigger>) {}

    /// The trigger was queued at its threshold price.
    fn on_queued(&self, _trigger: &Rc<Trigger>) {}

    /// Reserved: submitting an already-queued trigger is silently
    /// ignored, so the book never invokes this today.
    fn on_rejected(&self, _trigger: &Rc<Trigger>) {}

    /// The last-trade price crossed the threshold. The callback may
    /// re-submit the trigger (possibly at a new price); if it does
    /// not, the trigger's book reference is released afterwards.
    fn on_triggered(&self, _trigger: &Rc<Trigger>) {}

    /// The trigger was canceled. Fires after removal; re-queueing the
    /// trigger from inside the callback keeps its book reference.
    fn on_canceled(&self, _trigger: &Rc<Trigger>) {}
}

/// The unit handler: a trigger that fires without effect.
impl TriggerHandler for () {}

/// A resting trigger: side, movable threshold price, and callbacks.
pub struct Trigger {
    side: Side,
    price: Cell<f64>,
    queued: Cell<bool>,
    book: RefCell<Weak<BookShared>>,
    node: Cell<NodeIndex>,
    handler: Box<dyn TriggerHandler>,
    this: Weak<Trigger>,
}

impl Trigger {
    /// Create a trigger.
    ///
    /// Bid-side triggers respond to falling last-trade prices,
    /// ask-side triggers to rising ones.
    pub fn new(side: Side, price: f64, handler: impl TriggerHandler + 'static) -> Rc<Trigger> {
        Rc::new_cyclic(|this| Trigger {
            side,
            price: Cell::new(price),
            queued: Cell::new(false),
            book: RefCell::new(Weak::new()),
            node: Cell::new(NULL_INDEX),
            handler: Box::new(handler),
            this: this.clone(),
        })
    }

    /// The side the trigger rests on.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// The threshold price.
    #[inline]
    pub fn price(&self) -> f64 {
        self.price.get()
    }

    /// Whether the trigger currently rests in a book.
    #[inline]
    pub fn is_queued(&self) -> bool {
        self.queued.get()
    }

    /// The book the trigger was submitted to, if it is resident or a
    /// callback is in flight.
    pub fn book(&self) -> Option<Book> {
        self.book.borrow().upgrade().map(Book::from_shared)
    }

    /// Cancel the trigger. Only queued triggers can be canceled.
    ///
    /// `on_canceled` fires after removal and may re-queue the trigger.
    ///
    /// # Returns
    /// `true` if the trigger was removed, `false` if it was not queued.
    pub fn cancel(&self) -> bool {
        if !self.queued.get() {
            return false;
        }
        match self.book() {
            Some(book) => book.cancel_trigger(&self.handle()),
            None => false,
        }
    }

    /// Move the trigger to a new threshold price.
    ///
    /// Unchanged prices are ignored. A queued trigger is removed from
    /// its level first; the trigger is then re-submitted through its
    /// book, which may fire it immediately if the last-trade price has
    /// already crossed the new threshold. Without a live book
    /// reference only the price is updated.
    pub fn set_price(&self, price: f64) {
        if price == self.price.get() {
            return;
        }
        let book = self.book();
        if self.queued.get() {
            if let Some(book) = &book {
                book.unqueue_trigger(self);
            }
        }
        self.price.set(price);
        if let Some(book) = &book {
            book.submit_trigger(&self.handle());
        }
    }

    // ========================================================================
    // Engine-internal state
    // ========================================================================

    pub(crate) fn handle(&self) -> Rc<Trigger> {
        self.this.upgrade().unwrap()
    }

    pub(crate) fn handler(&self) -> &dyn TriggerHandler {
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
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("side", &self.side)
            .field("price", &self.price.get())
            .field("queued", &self.queued.get())
            .finish()
    }
}
