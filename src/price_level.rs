//! Price Level - the FIFO queue of orders resting at a single price.
//!
//! Two intrusive doubly-linked lists are threaded through the same
//! arena nodes: the main FIFO (insertion order = time priority) and
//! the all-or-none index, which chains only the AON members in the
//! same relative order. Storing both sets of links on the node gives
//! O(1) removal from either list, so cancels and AON executions never
//! scan.
//!
//! The level also maintains the two quantity aggregates the
//! all-or-none fillability probe reads: `quantity` (partially
//! fillable, non-AON) and `aon_quantity`.

use std::rc::Rc;

use crate::arena::{Arena, NodeIndex, NULL_INDEX};
use crate::book::Event;
use crate::order::Order;

/// A queue node: the shared order handle plus the links of both lists.
pub(crate) struct OrderNode {
    pub(crate) order: Rc<Order>,
    pub(crate) prev: NodeIndex,
    pub(crate) next: NodeIndex,
    pub(crate) aon_prev: NodeIndex,
    pub(crate) aon_next: NodeIndex,
}

pub(crate) type OrderArena = Arena<OrderNode>;

/// All orders resting at one price, in time priority.
#[derive(Debug)]
pub(crate) struct OrderLevel {
    /// Oldest order (highest priority, first to match)
    head: NodeIndex,
    /// Newest order (last to match)
    tail: NodeIndex,
    /// Oldest all-or-none member
    aon_head: NodeIndex,
    aon_tail: NodeIndex,
    /// Total non-AON quantity; this part can fill partially
    quantity: f64,
    /// Total all-or-none quantity
    aon_quantity: f64,
    /// Number of orders at this level (AON included)
    count: u32,
}

impl OrderLevel {
    pub(crate) fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            aon_head: NULL_INDEX,
            aon_tail: NULL_INDEX,
            quantity: 0.0,
            aon_quantity: 0.0,
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub(crate) fn quantity(&self) -> f64 {
        self.quantity
    }

    #[inline]
    pub(crate) fn aon_quantity(&self) -> f64 {
        self.aon_quantity
    }

    #[inline]
    pub(crate) fn order_count(&self) -> u32 {
        self.count
    }

    /// Adjust the non-AON aggregate after an in-place quantity change.
    #[inline]
    pub(crate) fn add_quantity(&mut self, delta: f64) {
        self.quantity += delta;
    }

    /// Adjust the all-or-none aggregate after an in-place change.
    #[inline]
    pub(crate) fn add_aon_quantity(&mut self, delta: f64) {
        self.aon_quantity += delta;
    }

    /// Append an order to the FIFO, marking it queued and recording
    /// its locator.
    ///
    /// # Complexity
    /// O(1)
    pub(crate) fn insert(&mut self, arena: &mut OrderArena, order: Rc<Order>) -> NodeIndex {
        let all_or_nothing = order.is_all_or_nothing();
        let quantity = order.quantity();
        order.set_queued(true);

        let index = arena.insert(OrderNode {
            order,
            prev: self.tail,
            next: NULL_INDEX,
            aon_prev: NULL_INDEX,
            aon_next: NULL_INDEX,
        });
        arena.get(index).order.set_node(index);

        if self.tail == NULL_INDEX {
            self.head = index;
        } else {
            arena.get_mut(self.tail).next = index;
        }
        self.tail = index;
        self.count += 1;

        if all_or_nothing {
            self.aon_quantity += quantity;
            self.aon_push_back(arena, index);
        } else {
            self.quantity += quantity;
        }

        index
    }

    /// Remove an order from anywhere in the queue, updating both
    /// lists and the aggregates, and clearing the order's queued flag
    /// and locator.
    ///
    /// # Complexity
    /// O(1)
    pub(crate) fn erase(&mut self, arena: &mut OrderArena, index: NodeIndex) -> Rc<Order> {
        let (prev, next) = {
            let node = arena.get(index);
            (node.prev, node.next)
        };

        if prev == NULL_INDEX {
            self.head = next;
        } else {
            arena.get_mut(prev).next = next;
        }
        if next == NULL_INDEX {
            self.tail = prev;
        } else {
            arena.get_mut(next).prev = prev;
        }

        if arena.get(index).order.is_all_or_nothing() {
            self.aon_unlink(arena, index);
            self.aon_quantity -= arena.get(index).order.quantity();
        } else {
            self.quantity -= arena.get(index).order.quantity();
        }

        self.count -= 1;

        let node = arena.remove(index);
        node.order.set_queued(false);
        node.order.clear_node();
        node.order
    }

    /// Execute an inbound order against this level.
    ///
    /// Consumes members in FIFO order. A member with quantity within
    /// the inbound residual fills fully and leaves the level; a larger
    /// non-AON member fills partially and absorbs the whole residual;
    /// a larger all-or-none member is skipped (it can never partial
    /// fill), leaving members behind it still eligible.
    ///
    /// Trade pairs and released orders are recorded on `events`; both
    /// orders' quantities are settled before the events dispatch.
    ///
    /// # Returns
    /// The quantity traded at this level.
    pub(crate) fn trade(
        &mut self,
        arena: &mut OrderArena,
        incoming: &Rc<Order>,
        events: &mut Vec<Event>,
    ) -> f64 {
        let mut traded = 0.0;
        let mut remaining = incoming.quantity();
        let mut cursor = self.head;

        while cursor != NULL_INDEX && remaining > 0.0 {
            let next = arena.get(cursor).next;
            let resting_quantity = arena.get(cursor).order.quantity();

            if remaining >= resting_quantity {
                // Inbound covers the resting order entirely
                let resting = self.erase(arena, cursor);
                traded += resting_quantity;
                remaining -= resting_quantity;
                incoming.set_quantity_direct(remaining);
                resting.set_quantity_direct(0.0);
                events.push(Event::Traded {
                    resting: resting.clone(),
                    incoming: incoming.clone(),
                });
                events.push(Event::Released(resting));
            } else if !arena.get(cursor).order.is_all_or_nothing() {
                // Partial fill of the resting order absorbs the rest
                let resting = arena.get(cursor).order.clone();
                traded += remaining;
                resting.set_quantity_direct(resting_quantity - remaining);
                self.quantity -= remaining;
                remaining = 0.0;
                incoming.set_quantity_direct(0.0);
                events.push(Event::Traded {
                    resting,
                    incoming: incoming.clone(),
                });
                break;
            }
            // An all-or-none member larger than the residual is skipped

            cursor = next;
        }

        traded
    }

    /// Simulate executing `quantity` against this level without
    /// mutating anything.
    ///
    /// Same member-walk rules as [`OrderLevel::trade`]: a non-AON
    /// member larger than the residual is a partial-fill opportunity
    /// (residual 0), an oversized AON member is skipped.
    ///
    /// # Returns
    /// The residual quantity after the walk.
    pub(crate) fn simulate_trade(&self, arena: &OrderArena, quantity: f64) -> f64 {
        // Quick check against the whole level before walking members
        let total = self.quantity + self.aon_quantity;
        if quantity >= total {
            return quantity - total;
        }

        let mut remaining = quantity;
        let mut cursor = self.head;

        while cursor != NULL_INDEX {
            let node = arena.get(cursor);
            let resting_quantity = node.order.quantity();

            if remaining >= resting_quantity {
                remaining -= resting_quantity;
            } else if !node.order.is_all_or_nothing() {
                return 0.0;
            }

            cursor = node.next;
        }

        remaining
    }

    /// Flip a resting member's all-or-none membership, moving its
    /// quantity between the aggregates and re-slotting it in the AON
    /// index.
    ///
    /// When turning a member all-or-none, its index position must
    /// preserve price-time priority among AON members: immediately
    /// after the nearest preceding AON member in the main FIFO, or at
    /// the index head when none precedes it. The caller has already
    /// updated the order's own flag.
    pub(crate) fn flip_aon(
        &mut self,
        arena: &mut OrderArena,
        index: NodeIndex,
        all_or_nothing: bool,
    ) {
        let quantity = arena.get(index).order.quantity();

        if all_or_nothing {
            self.quantity -= quantity;
            self.aon_quantity += quantity;

            let mut cursor = arena.get(index).prev;
            while cursor != NULL_INDEX && !arena.get(cursor).order.is_all_or_nothing() {
                cursor = arena.get(cursor).prev;
            }
            if cursor == NULL_INDEX {
                self.aon_push_front(arena, index);
            } else {
                self.aon_insert_after(arena, cursor, index);
            }
        } else {
            self.aon_quantity -= quantity;
            self.quantity += quantity;
            self.aon_unlink(arena, index);
        }
    }

    /// The all-or-none members, oldest first.
    pub(crate) fn aon_members(&self, arena: &OrderArena) -> Vec<Rc<Order>> {
        let mut members = Vec::new();
        let mut cursor = self.aon_head;
        while cursor != NULL_INDEX {
            let node = arena.get(cursor);
            members.push(node.order.clone());
            cursor = node.aon_next;
        }
        members
    }

    /// All members in time priority, oldest first.
    pub(crate) fn members(&self, arena: &OrderArena) -> Vec<Rc<Order>> {
        let mut members = Vec::new();
        let mut cursor = self.head;
        while cursor != NULL_INDEX {
            let node = arena.get(cursor);
            members.push(node.order.clone());
            cursor = node.next;
        }
        members
    }

    // ========================================================================
    // AON index list plumbing
    // ========================================================================

    fn aon_push_back(&mut self, arena: &mut OrderArena, index: NodeIndex) {
        let node = arena.get_mut(index);
        node.aon_prev = self.aon_tail;
        node.aon_next = NULL_INDEX;
        if self.aon_tail == NULL_INDEX {
            self.aon_head = index;
        } else {
            arena.get_mut(self.aon_tail).aon_next = index;
        }
        self.aon_tail = index;
    }

    fn aon_push_front(&mut self, arena: &mut OrderArena, index: NodeIndex) {
        let node = arena.get_mut(index);
        node.aon_prev = NULL_INDEX;
        node.aon_next = self.aon_head;
        if self.aon_head == NULL_INDEX {
            self.aon_tail = index;
        } else {
            arena.get_mut(self.aon_head).aon_prev = index;
        }
        self.aon_head = index;
    }

    fn aon_insert_after(&mut self, arena: &mut OrderArena, after: NodeIndex, index: NodeIndex) {
        let following = arena.get(after).aon_next;
        {
            let node = arena.get_mut(index);
            node.aon_prev = after;
            node.aon_next = following;
        }
        arena.get_mut(after).aon_next = index;
        if following == NULL_INDEX {
            self.aon_tail = index;
        } else {
            arena.get_mut(following).aon_prev = index;
        }
    }

    fn aon_unlink(&mut self, arena: &mut OrderArena, index: NodeIndex) {
        let (aon_prev, aon_next) = {
            let node = arena.get(index);
            (node.aon_prev, node.aon_next)
        };
        if aon_prev == NULL_INDEX {
            self.aon_head = aon_next;
        } else {
            arena.get_mut(aon_prev).aon_next = aon_next;
        }
        if aon_next == NULL_INDEX {
            self.aon_tail = aon_prev;
        } else {
            arena.get_mut(aon_next).aon_prev = aon_prev;
        }
        let node = arena.get_mut(index);
        node.aon_prev = NULL_INDEX;
        node.aon_next = NULL_INDEX;
    }
}
