//! Book - the price-time-priority matching engine.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: match an inbound order against the opposite side,
//!    level by level in priority order
//! 2. TRIGGERS: fire every trigger the last-trade price crossed
//! 3. RESTING: queue any residual (or cancel it for IOC)
//!
//! All-or-none orders take a detour: a pure fillability probe decides
//! between full execution and resting, and any growth of resting
//! quantity re-checks the opposite side's parked AONs.
//!
//! ## Re-entrancy
//!
//! Every public operation runs in two phases: it first mutates the
//! book while collecting an event list, then dispatches the callbacks
//! with no internal borrow held. User code therefore never observes
//! the book mid-mutation, and callbacks may freely re-enter. Nested
//! order submissions are pushed onto a FIFO and drained when the
//! outermost operation completes; trigger submissions are never
//! deferred.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ladder::Ladder;
use crate::order::{Order, Side, MAX_PRICE, MIN_PRICE};
use crate::price_level::{OrderArena, OrderLevel};
use crate::trigger::Trigger;
use crate::trigger_level::{TriggerArena, TriggerLevel};

/// A callback recorded during the mutation phase, dispatched after.
pub(crate) enum Event {
    Accepted(Rc<Order>),
    Queued(Rc<Order>),
    Rejected(Rc<Order>),
    Canceled(Rc<Order>),
    /// A trade pair; the resting side's callback fires first.
    Traded {
        resting: Rc<Order>,
        incoming: Rc<Order>,
    },
    /// The order left the book: drop its back reference.
    Released(Rc<Order>),
    TriggerAccepted(Rc<Trigger>),
    TriggerQueued(Rc<Trigger>),
    /// Fire `on_triggered`; release the trigger unless the callback
    /// re-queued it.
    Fired(Rc<Trigger>),
}

/// Read-only snapshot of one price level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelInfo {
    pub price: f64,
    /// Non-AON quantity (can fill partially)
    pub quantity: f64,
    /// All-or-none quantity
    pub aon_quantity: f64,
    /// Number of resting orders, AON included
    pub orders: u32,
}

/// A single-instrument limit order book.
///
/// `Book` is a cheap cloneable handle; clones share the same book.
/// All operations are synchronous and single-threaded: one book lives
/// on one thread, independent books may live on different threads.
#[derive(Clone, Default)]
pub struct Book {
    shared: Rc<BookShared>,
}

pub(crate) struct BookShared {
    core: RefCell<Core>,
    /// While positive, nested order submissions are deferred.
    deferral_depth: Cell<usize>,
    deferred: RefCell<VecDeque<Rc<Order>>>,
}

impl Default for BookShared {
    fn default() -> Self {
        Self {
            core: RefCell::new(Core::new()),
            deferral_depth: Cell::new(0),
            deferred: RefCell::new(VecDeque::new()),
        }
    }
}

impl Book {
    /// Create a new empty book.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_shared(shared: Rc<BookShared>) -> Self {
        Self { shared }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit an order.
    ///
    /// A marketable order executes immediately; any residual is queued,
    /// or canceled for immediate-or-cancel. Orders already queued or
    /// with non-positive quantity are rejected via `on_rejected`.
    ///
    /// When called from inside another order's callback the submission
    /// is deferred: it runs, in arrival order, once the outermost
    /// operation completes. The outermost call returns only after all
    /// transitively induced work is done.
    pub fn submit(&self, order: &Rc<Order>) {
        if self.shared.deferral_depth.get() > 0 {
            trace!(price = order.price(), "submission deferred");
            self.shared.deferred.borrow_mut().push_back(order.clone());
            return;
        }

        self.begin_deferral();
        let mut events = Vec::new();
        {
            let mut core = self.shared.core.borrow_mut();
            if order.quantity() <= 0.0 {
                debug!(
                    side = ?order.side(),
                    price = order.price(),
                    quantity = order.quantity(),
                    "order rejected: non-positive quantity"
                );
                events.push(Event::Rejected(order.clone()));
            } else if order.is_queued() {
                debug!(
                    side = ?order.side(),
                    price = order.price(),
                    "order rejected: already queued"
                );
                events.push(Event::Rejected(order.clone()));
            } else {
                order.attach(Rc::downgrade(&self.shared));
                debug!(
                    side = ?order.side(),
                    price = order.price(),
                    quantity = order.quantity(),
                    "order accepted"
                );
                events.push(Event::Accepted(order.clone()));
                core.insert_order(order, &mut events);
            }
        }
        self.dispatch(events);
        self.end_deferral();
    }

    /// Submit a trigger.
    ///
    /// Unlike orders, triggers are never deferred. A trigger whose
    /// threshold the last-trade price has already crossed fires
    /// immediately (never on a book that has not traded yet);
    /// otherwise it is queued. Submitting an already-queued trigger is
    /// silently ignored.
    pub fn submit_trigger(&self, trigger: &Rc<Trigger>) {
        if trigger.is_queued() {
            return;
        }
        trigger.attach(Rc::downgrade(&self.shared));

        let mut events = vec![Event::TriggerAccepted(trigger.clone())];
        {
            let mut core = self.shared.core.borrow_mut();
            let crossed = match core.last_trade {
                Some(market) => match trigger.side() {
                    Side::Bid => trigger.price() >= market,
                    Side::Ask => trigger.price() <= market,
                },
                None => false,
            };
            if crossed {
                trace!(threshold = trigger.price(), "trigger fired at submit");
                events.push(Event::Fired(trigger.clone()));
            } else {
                core.queue_trigger(trigger);
                events.push(Event::TriggerQueued(trigger.clone()));
            }
        }
        self.dispatch(events);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Best bid price, or [`MIN_PRICE`] when no bids rest.
    pub fn best_bid(&self) -> f64 {
        self.shared
            .core
            .borrow()
            .bids
            .best_price()
            .unwrap_or(MIN_PRICE)
    }

    /// Best ask price, or [`MAX_PRICE`] when no asks rest.
    pub fn best_ask(&self) -> f64 {
        self.shared
            .core
            .borrow()
            .asks
            .best_price()
            .unwrap_or(MAX_PRICE)
    }

    /// Price of the most recent trade, or `None` on a book that has
    /// never traded.
    pub fn last_trade_price(&self) -> Option<f64> {
        self.shared.core.borrow().last_trade
    }

    /// Snapshot of one side's order levels in priority order.
    pub fn levels(&self, side: Side) -> Vec<LevelInfo> {
        let core = self.shared.core.borrow();
        core.order_ladder(side)
            .iter()
            .map(|(price, level)| LevelInfo {
                price,
                quantity: level.quantity(),
                aon_quantity: level.aon_quantity(),
                orders: level.order_count(),
            })
            .collect()
    }

    /// Look up the order level at an exact price.
    ///
    /// # Complexity
    /// O(log n) in the number of levels
    pub fn level_at(&self, side: Side, price: f64) -> Option<LevelInfo> {
        let core = self.shared.core.borrow();
        core.order_ladder(side).get(price).map(|level| LevelInfo {
            price,
            quantity: level.quantity(),
            aon_quantity: level.aon_quantity(),
            orders: level.order_count(),
        })
    }

    /// Walk the whole book asserting its internal invariants:
    /// aggregate consistency, AON-index parity, locator validity,
    /// trigger residency, deferral balance, and that partially
    /// fillable liquidity never rests crossed.
    ///
    /// Intended for tests and debugging; panics on violation.
    pub fn audit(&self) {
        assert_eq!(
            self.shared.deferral_depth.get(),
            0,
            "deferral depth out of balance"
        );
        assert!(
            self.shared.deferred.borrow().is_empty(),
            "deferred queue not drained"
        );
        self.shared.core.borrow().audit();
    }

    // ========================================================================
    // Entity back-ends (reached through Order / Trigger methods)
    // ========================================================================

    pub(crate) fn cancel_order(&self, order: &Order) -> bool {
        {
            let mut core = self.shared.core.borrow_mut();
            if !order.is_queued() {
                return false;
            }
            core.remove_order(order);
        }
        order.detach();
        debug!(side = ?order.side(), price = order.price(), "order canceled by owner");
        true
    }

    pub(crate) fn update_order_quantity(&self, order: &Rc<Order>, quantity: f64) {
        self.begin_deferral();
        let mut events = Vec::new();
        {
            let mut core = self.shared.core.borrow_mut();
            core.update_quantity(order, quantity, &mut events);
        }
        self.dispatch(events);
        self.end_deferral();
    }

    pub(crate) fn update_order_aon(&self, order: &Order, all_or_nothing: bool) {
        let mut core = self.shared.core.borrow_mut();
        order.set_all_or_nothing_direct(all_or_nothing);
        let (ladder, arena) = core.order_side_mut(order.side());
        if let Some(level) = ladder.get_mut(order.price()) {
            level.flip_aon(arena, order.node_index(), all_or_nothing);
        }
    }

    pub(crate) fn cancel_trigger(&self, trigger: &Rc<Trigger>) -> bool {
        {
            let mut core = self.shared.core.borrow_mut();
            if !trigger.is_queued() {
                return false;
            }
            core.remove_trigger(trigger);
        }
        trigger.handler().on_canceled(trigger);
        if !trigger.is_queued() {
            trigger.detach();
        }
        true
    }

    /// Remove a queued trigger without firing `on_canceled`; used by
    /// [`Trigger::set_price`] before re-submission.
    pub(crate) fn unqueue_trigger(&self, trigger: &Trigger) {
        let mut core = self.shared.core.borrow_mut();
        if trigger.is_queued() {
            core.remove_trigger(trigger);
        }
    }

    // ========================================================================
    // Deferral and dispatch
    // ========================================================================

    fn begin_deferral(&self) {
        self.shared
            .deferral_depth
            .set(self.shared.deferral_depth.get() + 1);
    }

    /// Leave the deferral scope; at depth zero, drain the deferred
    /// submissions in FIFO order, each wrapped in its own scope so its
    /// nested submissions are deferred again.
    fn end_deferral(&self) {
        let depth = self.shared.deferral_depth.get() - 1;
        self.shared.deferral_depth.set(depth);
        if depth != 0 {
            return;
        }
        loop {
            let next = self.shared.deferred.borrow_mut().pop_front();
            match next {
                Some(order) => self.submit(&order),
                None => break,
            }
        }
    }

    /// Run the collected callbacks. No internal borrow is held here,
    /// so handlers may re-enter the book.
    fn dispatch(&self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::Accepted(order) => order.handler().on_accepted(&order),
                Event::Queued(order) => order.handler().on_queued(&order),
                Event::Rejected(order) => order.handler().on_rejected(&order),
                Event::Canceled(order) => order.handler().on_canceled(&order),
                Event::Traded { resting, incoming } => {
                    resting.handler().on_traded(&resting, &incoming);
                    incoming.handler().on_traded(&incoming, &resting);
                }
                Event::Released(order) => order.detach(),
                Event::TriggerAccepted(trigger) => trigger.handler().on_accepted(&trigger),
                Event::TriggerQueued(trigger) => trigger.handler().on_queued(&trigger),
                Event::Fired(trigger) => {
                    trigger.handler().on_triggered(&trigger);
                    if !trigger.is_queued() {
                        trigger.detach();
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.borrow();
        f.debug_struct("Book")
            .field("best_bid", &core.bids.best_price())
            .field("best_ask", &core.asks.best_price())
            .field("last_trade", &core.last_trade)
            .field("bid_levels", &core.bids.len())
            .field("ask_levels", &core.asks.len())
            .finish()
    }
}

// ============================================================================
// Core: the single-borrow mutation phase
// ============================================================================

struct Core {
    bids: Ladder<OrderLevel>,
    asks: Ladder<OrderLevel>,
    bid_triggers: Ladder<TriggerLevel>,
    ask_triggers: Ladder<TriggerLevel>,
    orders: OrderArena,
    triggers: TriggerArena,
    /// Price of the most recent trade; `None` until the first trade,
    /// which keeps freshly submitted triggers from firing on a quiet
    /// book.
    last_trade: Option<f64>,
}

impl Core {
    fn new() -> Self {
        Self {
            bids: Ladder::new(Side::Bid),
            asks: Ladder::new(Side::Ask),
            bid_triggers: Ladder::new(Side::Bid),
            ask_triggers: Ladder::new(Side::Ask),
            orders: OrderArena::new(),
            triggers: TriggerArena::new(),
            last_trade: None,
        }
    }

    fn order_ladder(&self, side: Side) -> &Ladder<OrderLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn order_side_mut(&mut self, side: Side) -> (&mut Ladder<OrderLevel>, &mut OrderArena) {
        match side {
            Side::Bid => (&mut self.bids, &mut self.orders),
            Side::Ask => (&mut self.asks, &mut self.orders),
        }
    }

    fn trigger_ladder(&self, side: Side) -> &Ladder<TriggerLevel> {
        match side {
            Side::Bid => &self.bid_triggers,
            Side::Ask => &self.ask_triggers,
        }
    }

    fn trigger_side_mut(&mut self, side: Side) -> (&mut Ladder<TriggerLevel>, &mut TriggerArena) {
        match side {
            Side::Bid => (&mut self.bid_triggers, &mut self.triggers),
            Side::Ask => (&mut self.ask_triggers, &mut self.triggers),
        }
    }

    // ------------------------------------------------------------------------
    // Inbound routing
    // ------------------------------------------------------------------------

    fn insert_order(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        if order.is_all_or_nothing() {
            self.insert_all_or_nothing(order, events);
        } else {
            self.insert_plain(order, events);
        }
    }

    fn insert_plain(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        self.execute(order, events);

        if order.is_immediate_or_cancel() {
            if order.quantity() > 0.0 {
                debug!(
                    price = order.price(),
                    residual = order.quantity(),
                    "immediate-or-cancel residual canceled"
                );
                events.push(Event::Canceled(order.clone()));
            }
            events.push(Event::Released(order.clone()));
            return;
        }

        if order.quantity() > 0.0 {
            self.queue_order(order, events);
        } else {
            events.push(Event::Released(order.clone()));
        }
    }

    /// An all-or-none order trades fully or not at all: probe first,
    /// then either run the real walk (which completes it) or rest it.
    fn insert_all_or_nothing(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        if self.is_fillable(order.side(), order.price(), order.quantity()) {
            self.execute(order, events);
            events.push(Event::Released(order.clone()));
            return;
        }

        if order.is_immediate_or_cancel() {
            debug!(
                price = order.price(),
                quantity = order.quantity(),
                "all-or-none not fillable, immediate-or-cancel canceled"
            );
            events.push(Event::Canceled(order.clone()));
            events.push(Event::Released(order.clone()));
            return;
        }

        self.queue_order(order, events);
    }

    // ------------------------------------------------------------------------
    // The matching walk
    // ------------------------------------------------------------------------

    /// Match `order` against every crossing level on the opposite
    /// side, best first, then fire the triggers crossed by the price
    /// motion.
    fn execute(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        let opposite = order.side().opposite();
        let first_trade = self.last_trade.is_none();
        let crossing = self.order_ladder(opposite).crossing_prices(order.price());

        for price in crossing {
            if order.quantity() <= 0.0 {
                break;
            }
            let (ladder, arena) = self.order_side_mut(opposite);
            let Some(level) = ladder.get_mut(price) else {
                continue;
            };
            let traded = level.trade(arena, order, events);
            if level.is_empty() {
                ladder.remove(price);
            }
            if traded > 0.0 {
                trace!(price, traded, "traded");
                self.last_trade = Some(price);
            }
        }

        self.fire_crossed_triggers(opposite, events);

        // The book's very first trade has no prior price: it counts as
        // both a rise and a fall, so triggers parked on either side
        // before any trade get their crossing check here too.
        if first_trade && self.last_trade.is_some() {
            self.fire_crossed_triggers(order.side(), events);
        }
    }

    /// Fire all triggers on `side` whose threshold the last-trade
    /// price has reached, level by level in priority order, FIFO
    /// within a level. Fired levels are removed.
    fn fire_crossed_triggers(&mut self, side: Side, events: &mut Vec<Event>) {
        let Some(market) = self.last_trade else {
            return;
        };
        let crossed = self.trigger_ladder(side).crossing_prices(market);

        for price in crossed {
            let (ladder, arena) = self.trigger_side_mut(side);
            let Some(level) = ladder.get_mut(price) else {
                continue;
            };
            while let Some(trigger) = level.pop_front(arena) {
                trace!(threshold = price, market, "trigger fired");
                events.push(Event::Fired(trigger));
            }
            ladder.remove(price);
        }
    }

    // ------------------------------------------------------------------------
    // All-or-none machinery
    // ------------------------------------------------------------------------

    /// Pure probe: can an order of `quantity` at `price` on `side` be
    /// satisfied entirely from current resting liquidity?
    ///
    /// Aggregate comparisons settle most levels; only a level the
    /// residual straddles needs a member walk.
    fn is_fillable(&self, side: Side, price: f64, quantity: f64) -> bool {
        let (ladder, arena) = match side.opposite() {
            Side::Bid => (&self.bids, &self.orders),
            Side::Ask => (&self.asks, &self.orders),
        };

        let mut remaining = quantity;
        for (_, level) in ladder.crossing(price) {
            if remaining <= 0.0 {
                break;
            }
            let total = level.quantity() + level.aon_quantity();
            if remaining >= total {
                remaining -= total;
            } else if remaining <= level.quantity() {
                return true;
            } else {
                remaining = level.simulate_trade(arena, remaining);
            }
        }

        remaining <= 0.0
    }

    /// Re-check parked all-or-none orders on `side` that cross
    /// `price`, executing in place any that became fillable. Runs
    /// whenever resting quantity appears or grows on the other side.
    fn check_aons(&mut self, side: Side, price: f64, events: &mut Vec<Event>) {
        for level_price in self.order_ladder(side).crossing_prices(price) {
            let candidates = match self.order_ladder(side).get(level_price) {
                Some(level) => level.aon_members(&self.orders),
                None => continue,
            };
            for order in candidates {
                if self.is_fillable(order.side(), order.price(), order.quantity()) {
                    trace!(
                        price = order.price(),
                        quantity = order.quantity(),
                        "resting all-or-none became fillable"
                    );
                    self.execute_queued_aon(&order, events);
                }
            }
        }
    }

    /// Execute a resting all-or-none order as a pseudo-inbound against
    /// the opposite side, then settle its level reservation and unlink
    /// it.
    fn execute_queued_aon(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        let quantity = order.quantity();
        self.execute(order, events);

        let price = order.price();
        let (ladder, arena) = self.order_side_mut(order.side());
        if let Some(level) = ladder.get_mut(price) {
            // The aggregate still carries the original reservation;
            // erase below only debits the post-execution quantity.
            level.add_aon_quantity(-quantity);
            level.erase(arena, order.node_index());
            if level.is_empty() {
                ladder.remove(price);
            }
        }
        events.push(Event::Released(order.clone()));
    }

    // ------------------------------------------------------------------------
    // Resting-side bookkeeping
    // ------------------------------------------------------------------------

    fn queue_order(&mut self, order: &Rc<Order>, events: &mut Vec<Event>) {
        let side = order.side();
        let price = order.price();
        {
            let (ladder, arena) = self.order_side_mut(side);
            let level = ladder.or_insert_with(price, OrderLevel::new);
            level.insert(arena, order.clone());
        }
        trace!(?side, price, quantity = order.quantity(), "order queued");

        // New resting quantity may unblock an opposite-side AON
        self.check_aons(side.opposite(), price, events);

        events.push(Event::Queued(order.clone()));
    }

    fn queue_trigger(&mut self, trigger: &Rc<Trigger>) {
        let side = trigger.side();
        let price = trigger.price();
        let (ladder, arena) = self.trigger_side_mut(side);
        let level = ladder.or_insert_with(price, TriggerLevel::new);
        level.insert(arena, trigger.clone());
        trace!(?side, threshold = price, "trigger queued");
    }

    fn remove_order(&mut self, order: &Order) {
        let price = order.price();
        let (ladder, arena) = self.order_side_mut(order.side());
        if let Some(level) = ladder.get_mut(price) {
            level.erase(arena, order.node_index());
            if level.is_empty() {
                ladder.remove(price);
            }
        }
    }

    fn remove_trigger(&mut self, trigger: &Trigger) {
        let price = trigger.price();
        let (ladder, arena) = self.trigger_side_mut(trigger.side());
        if let Some(level) = ladder.get_mut(price) {
            level.erase(arena, trigger.node_index());
            if level.is_empty() {
                ladder.remove(price);
            }
        }
    }

    /// Quantity update for a queued order; see
    /// [`Order::set_quantity`] for the contract.
    fn update_quantity(&mut self, order: &Rc<Order>, quantity: f64, events: &mut Vec<Event>) {
        let previous = order.quantity();
        let side = order.side();
        let price = order.price();
        let all_or_nothing = order.is_all_or_nothing();

        {
            let (ladder, _) = self.order_side_mut(side);
            let Some(level) = ladder.get_mut(price) else {
                return;
            };
            if all_or_nothing {
                level.add_aon_quantity(quantity - previous);
            } else {
                level.add_quantity(quantity - previous);
            }
        }
        order.set_quantity_direct(quantity);

        if all_or_nothing {
            if quantity < previous {
                // Shrinking may have made this order itself fillable
                if self.is_fillable(side, price, quantity) {
                    self.execute_queued_aon(order, events);
                }
            } else {
                self.check_aons(side.opposite(), price, events);
            }
        } else if quantity > previous {
            self.check_aons(side.opposite(), price, events);
        }
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    fn audit(&self) {
        self.audit_order_side(&self.bids, Side::Bid);
        self.audit_order_side(&self.asks, Side::Ask);
        self.audit_trigger_side(&self.bid_triggers, Side::Bid);
        self.audit_trigger_side(&self.ask_triggers, Side::Ask);

        // Partially fillable liquidity never rests crossed; only
        // blocked all-or-none quantity may straddle the spread.
        let best_plain_bid = self
            .bids
            .iter()
            .find(|(_, level)| level.quantity() > 0.0)
            .map(|(price, _)| price);
        let best_plain_ask = self
            .asks
            .iter()
            .find(|(_, level)| level.quantity() > 0.0)
            .map(|(price, _)| price);
        if let (Some(bid), Some(ask)) = (best_plain_bid, best_plain_ask) {
            assert!(bid < ask, "plain liquidity crossed: bid {bid} >= ask {ask}");
        }
    }

    fn audit_order_side(&self, ladder: &Ladder<OrderLevel>, side: Side) {
        for (price, level) in ladder.iter() {
            let members = level.members(&self.orders);
            assert!(!members.is_empty(), "empty order level resident at {price}");
            assert_eq!(members.len() as u32, level.order_count());

            let mut quantity = 0.0;
            let mut aon_quantity = 0.0;
            let mut max_quantity: f64 = 1.0;
            for order in &members {
                assert!(order.is_queued(), "resident order not marked queued");
                assert_eq!(order.side(), side);
                assert_eq!(order.price(), price);
                assert!(order.quantity() > 0.0, "zero-quantity order resident");
                let node = self.orders.get(order.node_index());
                assert!(Rc::ptr_eq(&node.order, order), "locator does not resolve");
                if order.is_all_or_nothing() {
                    aon_quantity += order.quantity();
                } else {
                    quantity += order.quantity();
                }
                max_quantity = max_quantity.max(order.quantity());
            }

            let tolerance = 1e-9 * max_quantity;
            assert!(
                (quantity - level.quantity()).abs() <= tolerance,
                "quantity aggregate drifted at {price}"
            );
            assert!(
                (aon_quantity - level.aon_quantity()).abs() <= tolerance,
                "all-or-none aggregate drifted at {price}"
            );

            let indexed = level.aon_members(&self.orders);
            let filtered: Vec<_> = members
                .iter()
                .filter(|order| order.is_all_or_nothing())
                .collect();
            assert_eq!(indexed.len(), filtered.len(), "AON index out of parity");
            for (a, b) in indexed.iter().zip(filtered) {
                assert!(Rc::ptr_eq(a, b), "AON index order diverges from FIFO");
            }
        }
    }

    fn audit_trigger_side(&self, ladder: &Ladder<TriggerLevel>, side: Side) {
        for (price, level) in ladder.iter() {
            let members = level.members(&self.triggers);
            assert!(
                !members.is_empty(),
                "empty trigger level resident at {price}"
            );
            assert_eq!(members.len() as u32, level.trigger_count());
            for trigger in &members {
                assert!(trigger.is_queued());
                assert_eq!(trigger.side(), side);
                assert_eq!(trigger.price(), price);
                let node = self.triggers.get(trigger.node_index());
                assert!(
                    Rc::ptr_eq(&node.trigger, trigger),
                    "trigger locator does not resolve"
                );
            }
            if let Some(market) = self.last_trade {
                match side {
                    Side::Bid => assert!(price < market, "crossed bid trigger resident"),
                    Side::Ask => assert!(price > market, "crossed ask trigger resident"),
                }
            }
        }
    }
}

/// Entities outlive the book; leave none of them claiming residency
/// in a book that no longer exists.
impl Drop for Core {
    fn drop(&mut self) {
        for node in self.orders.iter() {
            node.order.set_queued(false);
            node.order.clear_node();
        }
        for node in self.triggers.iter() {
            node.trigger.set_queued(false);
            node.trigger.clear_node();
        }
    }
}
