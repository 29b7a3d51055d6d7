//! Ladder - a price-keyed map of levels, ordered by side priority.
//!
//! Bids iterate best-first from the highest price, asks from the
//! lowest. The same "crossing" range query serves the matching walk,
//! the all-or-none fillability probe, the resting-AON re-check, and
//! the trigger pass: given a reference price, it yields exactly the
//! levels a counterparty at that price reaches, in priority order.
//!
//! Keys are `OrderedFloat<f64>` so the infinite market-order
//! sentinels order correctly.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::order::Side;

/// Price levels for one side of a book, keyed and ordered by price.
#[derive(Debug)]
pub(crate) struct Ladder<L> {
    side: Side,
    levels: BTreeMap<OrderedFloat<f64>, L>,
}

impl<L> Ladder<L> {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.levels.len()
    }

    /// Best price on this side: highest bid, lowest ask.
    pub(crate) fn best_price(&self) -> Option<f64> {
        let entry = match self.side {
            Side::Bid => self.levels.last_key_value(),
            Side::Ask => self.levels.first_key_value(),
        };
        entry.map(|(price, _)| price.into_inner())
    }

    #[inline]
    pub(crate) fn get(&self, price: f64) -> Option<&L> {
        self.levels.get(&OrderedFloat(price))
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, price: f64) -> Option<&mut L> {
        self.levels.get_mut(&OrderedFloat(price))
    }

    /// Get the level at `price`, creating it when absent.
    pub(crate) fn or_insert_with(&mut self, price: f64, default: impl FnOnce() -> L) -> &mut L {
        self.levels.entry(OrderedFloat(price)).or_insert_with(default)
    }

    pub(crate) fn remove(&mut self, price: f64) -> Option<L> {
        self.levels.remove(&OrderedFloat(price))
    }

    /// Iterate levels in priority order (best first).
    pub(crate) fn iter(&self) -> Box<dyn Iterator<Item = (f64, &L)> + '_> {
        match self.side {
            Side::Bid => Box::new(
                self.levels
                    .iter()
                    .rev()
                    .map(|(price, level)| (price.into_inner(), level)),
            ),
            Side::Ask => Box::new(
                self.levels
                    .iter()
                    .map(|(price, level)| (price.into_inner(), level)),
            ),
        }
    }

    /// Iterate the levels a counterparty at `limit` crosses, in
    /// priority order: asks priced at or below a bid limit, bids
    /// priced at or above an ask limit.
    pub(crate) fn crossing(&self, limit: f64) -> Box<dyn Iterator<Item = (f64, &L)> + '_> {
        match self.side {
            Side::Bid => Box::new(
                self.levels
                    .range(OrderedFloat(limit)..)
                    .rev()
                    .map(|(price, level)| (price.into_inner(), level)),
            ),
            Side::Ask => Box::new(
                self.levels
                    .range(..=OrderedFloat(limit))
                    .map(|(price, level)| (price.into_inner(), level)),
            ),
        }
    }

    /// The crossing level prices as a snapshot, for walks that mutate
    /// the ladder while visiting (levels are re-resolved by price).
    pub(crate) fn crossing_prices(&self, limit: f64) -> Vec<f64> {
        self.crossing(limit).map(|(price, _)| price).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder_with(side: Side, prices: &[f64]) -> Ladder<u32> {
        let mut ladder = Ladder::new(side);
        for (i, &price) in prices.iter().enumerate() {
            ladder.or_insert_with(price, || i as u32);
        }
        ladder
    }

    #[test]
    fn test_best_price_by_side() {
        let bids = ladder_with(Side::Bid, &[99.0, 101.0, 100.0]);
        let asks = ladder_with(Side::Ask, &[103.0, 102.0, 104.0]);

        assert_eq!(bids.best_price(), Some(101.0));
        assert_eq!(asks.best_price(), Some(102.0));

        let empty: Ladder<u32> = Ladder::new(Side::Bid);
        assert_eq!(empty.best_price(), None);
    }

    #[test]
    fn test_iter_priority_order() {
        let bids = ladder_with(Side::Bid, &[99.0, 101.0, 100.0]);
        let prices: Vec<f64> = bids.iter().map(|(price, _)| price).collect();
        assert_eq!(prices, vec![101.0, 100.0, 99.0]);

        let asks = ladder_with(Side::Ask, &[103.0, 102.0, 104.0]);
        let prices: Vec<f64> = asks.iter().map(|(price, _)| price).collect();
        assert_eq!(prices, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn test_crossing_asks_against_bid_limit() {
        let asks = ladder_with(Side::Ask, &[10.0, 11.0, 12.0]);
        assert_eq!(asks.crossing_prices(11.0), vec![10.0, 11.0]);
        assert_eq!(asks.crossing_prices(9.0), Vec::<f64>::new());
        // A market buy crosses everything
        assert_eq!(asks.crossing_prices(f64::INFINITY), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_crossing_bids_against_ask_limit() {
        let bids = ladder_with(Side::Bid, &[10.0, 11.0, 12.0]);
        assert_eq!(bids.crossing_prices(11.0), vec![12.0, 11.0]);
        assert_eq!(bids.crossing_prices(13.0), Vec::<f64>::new());
        // A market sell crosses everything
        assert_eq!(bids.crossing_prices(0.0), vec![12.0, 11.0, 10.0]);
    }

    #[test]
    fn test_remove_and_len() {
        let mut asks = ladder_with(Side::Ask, &[10.0, 11.0]);
        assert_eq!(asks.len(), 2);
        assert!(asks.remove(10.0).is_some());
        assert!(asks.remove(10.0).is_none());
        assert_eq!(asks.len(), 1);
        assert_eq!(asks.best_price(), Some(11.0));
    }
}
