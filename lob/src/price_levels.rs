//! Price level management for one side of the order book

use common::{Px, Qty, Side};
use smallvec::SmallVec;

/// Fixed depth for order book (32 levels per side)
pub const DEPTH: usize = 32;

/// Prices removed by a single update
pub type Removed = SmallVec<[Px; 4]>;

/// One side of the order book, kept sorted best-first
///
/// Structure-of-arrays: prices and quantities in separate contiguous arrays.
/// Bids sort descending, asks ascending. Levels beyond `DEPTH` are discarded.
#[derive(Clone, Debug)]
pub struct SideBook {
    /// Which side this is
    pub side: Side,
    /// Price levels (0 = best, DEPTH-1 = worst)
    pub prices: [Px; DEPTH],
    /// Quantities at each level
    pub qtys: [Qty; DEPTH],
    /// Number of valid levels
    pub depth: usize,
}

impl SideBook {
    /// Create a new empty side book
    #[inline]
    #[must_use]
    pub const fn new(side: Side) -> Self {
        Self {
            side,
            prices: [Px::ZERO; DEPTH],
            qtys: [Qty::ZERO; DEPTH],
            depth: 0,
        }
    }

    /// Whether `a` ranks ahead of `b` on this side
    #[inline]
    const fn better(&self, a: Px, b: Px) -> bool {
        match self.side {
            Side::Bid => a.as_i64() > b.as_i64(),
            Side::Ask => a.as_i64() < b.as_i64(),
        }
    }

    /// Clear all levels, returning the prices that were removed
    #[inline]
    pub fn clear(&mut self) -> Removed {
        let removed = self.prices[..self.depth].iter().copied().collect();
        for qty in &mut self.qtys[..self.depth] {
            *qty = Qty::ZERO;
        }
        self.depth = 0;
        removed
    }

    /// Insert, update or (with zero qty) delete the level at `price`
    ///
    /// Returns `true` if the side changed.
    pub fn upsert(&mut self, price: Px, qty: Qty) -> bool {
        let mut index = 0;
        while index < self.depth && self.better(self.prices[index], price) {
            index += 1;
        }
        let exists = index < self.depth && self.prices[index] == price;

        if qty.is_zero() {
            if exists {
                self.remove_level(index);
                return true;
            }
            return false;
        }

        if exists {
            if self.qtys[index] == qty {
                return false;
            }
            self.qtys[index] = qty;
            return true;
        }

        if index >= DEPTH {
            // Worse than every level of a full side
            return false;
        }

        let last = self.depth.min(DEPTH - 1);
        for i in (index..last).rev() {
            self.prices[i + 1] = self.prices[i];
            self.qtys[i + 1] = self.qtys[i];
        }
        self.prices[index] = price;
        self.qtys[index] = qty;
        self.depth = (self.depth + 1).min(DEPTH);
        true
    }

    /// Make `price` the only level, with `qty`
    ///
    /// A top-of-book feed confirms nothing below the best level, so every
    /// other price is removed whichever side of `price` it sits on. A zero
    /// `qty` empties the side.
    pub fn replace_top(&mut self, price: Px, qty: Qty) -> Removed {
        if qty.is_zero() {
            return self.clear();
        }

        let mut removed = Removed::new();
        let mut index = 0;
        while index < self.depth {
            if self.prices[index] == price {
                index += 1;
            } else {
                removed.push(self.prices[index]);
                self.remove_level(index);
            }
        }
        self.upsert(price, qty);
        removed
    }

    /// Remove a level and shift others up
    #[inline]
    fn remove_level(&mut self, level: usize) {
        if level >= self.depth {
            return;
        }

        for i in level..self.depth - 1 {
            self.prices[i] = self.prices[i + 1];
            self.qtys[i] = self.qtys[i + 1];
        }

        self.depth -= 1;
        self.qtys[self.depth] = Qty::ZERO;
    }

    /// Get the best price and quantity
    #[inline]
    #[must_use]
    pub fn best(&self) -> Option<(Px, Qty)> {
        if self.depth > 0 {
            Some((self.prices[0], self.qtys[0]))
        } else {
            None
        }
    }

    /// Level at index `level`
    #[inline]
    #[must_use]
    pub fn level(&self, level: usize) -> Option<(Px, Qty)> {
        (level < self.depth).then(|| (self.prices[level], self.qtys[level]))
    }

    /// Get total quantity up to a certain depth
    #[inline]
    #[must_use]
    pub fn total_qty(&self, max_depth: usize) -> Qty {
        let limit = max_depth.min(self.depth);
        Qty::from_i64(self.qtys[..limit].iter().map(Qty::as_i64).sum())
    }

    /// Check if side is empty
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// Whether a resting level at `price` on this side would cross `opposite`
    #[inline]
    #[must_use]
    pub fn crosses(&self, price: Px, opposite: &Self) -> bool {
        opposite.best().is_some_and(|(best, _)| match self.side {
            Side::Bid => price >= best,
            Side::Ask => price <= best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn px(v: f64) -> Px {
        Px::new(v)
    }

    fn qty(v: f64) -> Qty {
        Qty::new(v)
    }

    #[test]
    fn test_bid_levels_sorted_descending() {
        let mut book = SideBook::new(Side::Bid);
        assert!(book.is_empty());

        book.upsert(px(99.0), qty(30.0));
        book.upsert(px(100.0), qty(10.0));
        book.upsert(px(99.5), qty(20.0));

        assert_eq!(book.depth, 3);
        assert_eq!(book.best(), Some((px(100.0), qty(10.0))));
        assert_eq!(book.level(1), Some((px(99.5), qty(20.0))));
        assert_eq!(book.level(2), Some((px(99.0), qty(30.0))));

        // Remove middle level
        assert!(book.upsert(px(99.5), Qty::ZERO));
        assert_eq!(book.depth, 2);
        assert_eq!(book.level(1), Some((px(99.0), qty(30.0))));

        // Deleting a missing level is a no-op
        assert!(!book.upsert(px(42.0), Qty::ZERO));
    }

    #[test]
    fn test_ask_levels_sorted_ascending() {
        let mut book = SideBook::new(Side::Ask);
        book.upsert(px(101.0), qty(1.0));
        book.upsert(px(100.5), qty(2.0));
        assert_eq!(book.best(), Some((px(100.5), qty(2.0))));
        assert!(!book.upsert(px(100.5), qty(2.0)));
        assert!(book.upsert(px(100.5), qty(3.0)));
        assert_eq!(book.best(), Some((px(100.5), qty(3.0))));
    }

    #[test]
    fn test_replace_top_drops_stale_levels() {
        let mut book = SideBook::new(Side::Bid);
        book.upsert(px(100.0), qty(1.0));
        book.upsert(px(99.0), qty(2.0));
        book.upsert(px(98.0), qty(3.0));

        // Bid falls to 99: 100 and 98 go, 99 updated
        let removed = book.replace_top(px(99.0), qty(5.0));
        assert_eq!(removed.as_slice(), &[px(100.0), px(98.0)]);
        assert_eq!(book.best(), Some((px(99.0), qty(5.0))));
        assert_eq!(book.depth, 1);

        // Zero size empties the side
        let removed = book.replace_top(px(99.0), Qty::ZERO);
        assert_eq!(removed.as_slice(), &[px(99.0)]);
        assert!(book.is_empty());
    }

    #[rstest::rstest]
    #[case::bid_improves(Side::Bid, 100.0, 101.0)]
    #[case::ask_improves(Side::Ask, 102.0, 101.5)]
    #[case::bid_worsens(Side::Bid, 100.0, 99.0)]
    fn test_replace_top_leaves_single_level(#[case] side: Side, #[case] first: f64, #[case] second: f64) {
        let mut book = SideBook::new(side);
        assert!(book.replace_top(px(first), qty(1.0)).is_empty());

        let removed = book.replace_top(px(second), qty(2.0));
        assert_eq!(removed.as_slice(), &[px(first)]);
        assert_eq!(book.depth, 1);
        assert_eq!(book.best(), Some((px(second), qty(2.0))));
    }

    #[test]
    fn test_full_side_discards_worst() {
        let mut book = SideBook::new(Side::Ask);
        for i in 0..DEPTH {
            book.upsert(Px::from_i64(1_000 + i as i64), qty(1.0));
        }
        assert_eq!(book.depth, DEPTH);

        // Worse than everything: ignored
        assert!(!book.upsert(Px::from_i64(5_000), qty(1.0)));
        // Better than everything: inserted, worst falls off
        assert!(book.upsert(Px::from_i64(999), qty(1.0)));
        assert_eq!(book.depth, DEPTH);
        assert_eq!(book.best().map(|(p, _)| p), Some(Px::from_i64(999)));
        assert_eq!(book.level(DEPTH - 1).map(|(p, _)| p), Some(Px::from_i64(1_030)));
    }

    #[test]
    fn test_total_qty() {
        let mut book = SideBook::new(Side::Bid);
        book.upsert(px(100.0), qty(10.0));
        book.upsert(px(99.5), qty(20.0));
        book.upsert(px(99.0), qty(30.0));

        assert_eq!(book.total_qty(2), qty(30.0));
        assert_eq!(book.total_qty(10), qty(60.0));
    }

    proptest! {
        #[test]
        fn prop_levels_stay_sorted_and_unique(
            ops in prop::collection::vec((1i64..200, 0i64..5), 1..200)
        ) {
            let mut book = SideBook::new(Side::Bid);
            for (price, size) in ops {
                book.upsert(Px::from_i64(price), Qty::from_i64(size));
            }
            for i in 1..book.depth {
                prop_assert!(book.prices[i - 1] > book.prices[i]);
            }
            for i in 0..book.depth {
                prop_assert!(book.qtys[i].is_positive());
            }
        }
    }
}
