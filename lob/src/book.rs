//! Core order book implementation

use crate::price_levels::{DEPTH, SideBook};
use common::{BookDelta, Px, Qty, Side, Symbol, TickUpdate, TopOfBook, Ts};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Capacity of the per-symbol recent-update ring
pub const RECENT_UPDATES: usize = 1000;

/// Level changes caused by one update
pub type Deltas = SmallVec<[BookDelta; 4]>;

/// Sequence discontinuity detected on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// Sequence the book expected next
    pub expected: u64,
    /// Sequence that arrived
    pub received: u64,
}

impl SequenceGap {
    /// Number of missing updates
    #[must_use]
    pub const fn missing(&self) -> u64 {
        self.received - self.expected
    }
}

/// Result of applying one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// New best bid/offer, present only when both sides are quoted
    pub top: Option<TopOfBook>,
    /// Level changes, removals first
    pub deltas: Deltas,
    /// Gap detected on this tick
    pub gap: Option<SequenceGap>,
}

/// Full order book for a single symbol
#[derive(Clone, Debug)]
pub struct OrderBook {
    /// Symbol this book represents
    pub symbol: Symbol,
    /// Last update timestamp
    pub last_update: Ts,
    /// Bid side (buyers)
    pub bids: SideBook,
    /// Ask side (sellers)
    pub asks: SideBook,
    /// Last applied tick sequence, 0 before the first tick
    pub sequence: u64,
    recent: VecDeque<TickUpdate>,
    recovery_pending: bool,
}

impl OrderBook {
    /// Create a new empty order book
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            last_update: Ts::from_nanos(0),
            bids: SideBook::new(Side::Bid),
            asks: SideBook::new(Side::Ask),
            sequence: 0,
            recent: VecDeque::with_capacity(RECENT_UPDATES),
            recovery_pending: false,
        }
    }

    fn validate_side(side: Side, price: Px, size: Qty) -> Result<(), BookError> {
        if size.as_i64() < 0 {
            return Err(BookError::NegativeSize { side, size });
        }
        if size.is_positive() && !price.is_positive() {
            return Err(BookError::InvalidPrice { side, price });
        }
        Ok(())
    }

    /// Check a tick without touching the book
    pub fn validate(&self, tick: &TickUpdate) -> Result<(), BookError> {
        Self::validate_side(Side::Bid, tick.bid_price, tick.bid_size)?;
        Self::validate_side(Side::Ask, tick.ask_price, tick.ask_size)?;
        if tick.is_two_sided() && tick.bid_price >= tick.ask_price {
            return Err(BookError::CrossedBook {
                bid: Some(tick.bid_price),
                ask: Some(tick.ask_price),
            });
        }
        if self.sequence > 0 && tick.sequence <= self.sequence {
            return Err(BookError::StaleSequence {
                last: self.sequence,
                received: tick.sequence,
            });
        }
        Ok(())
    }

    /// Apply a top-of-book tick
    ///
    /// Each side's best level is replaced by the tick; a zero size empties the
    /// side. Invalid, crossed and stale ticks are rejected without mutation.
    /// A forward gap in `sequence` is reported and flags the book for recovery,
    /// but the tick is still applied.
    pub fn apply_tick(&mut self, tick: &TickUpdate) -> Result<TickOutcome, BookError> {
        self.validate(tick)?;

        let gap = (self.sequence > 0 && tick.sequence > self.sequence + 1).then(|| SequenceGap {
            expected: self.sequence + 1,
            received: tick.sequence,
        });
        if gap.is_some() {
            self.recovery_pending = true;
        }

        if self.recent.len() == RECENT_UPDATES {
            self.recent.pop_front();
        }
        self.recent.push_back(tick.clone());

        let mut deltas = Deltas::new();
        Self::replace_side(&mut self.bids, tick, tick.bid_price, tick.bid_size, &mut deltas);
        Self::replace_side(&mut self.asks, tick, tick.ask_price, tick.ask_size, &mut deltas);

        self.last_update = tick.ts;
        self.sequence = tick.sequence;

        Ok(TickOutcome {
            top: self.top_of_book(),
            deltas,
            gap,
        })
    }

    fn replace_side(side: &mut SideBook, tick: &TickUpdate, price: Px, size: Qty, deltas: &mut Deltas) {
        let before = side.best();
        for removed in side.replace_top(price, size) {
            deltas.push(BookDelta {
                ts: tick.ts,
                symbol: tick.symbol,
                side: side.side,
                price: removed,
                size: Qty::ZERO,
            });
        }
        let after = side.best();
        if let Some((price, size)) = after {
            if before != after {
                deltas.push(BookDelta {
                    ts: tick.ts,
                    symbol: tick.symbol,
                    side: side.side,
                    price,
                    size,
                });
            }
        }
    }

    /// Apply an incremental level change
    ///
    /// Returns `true` if the book changed. A level that would cross the
    /// opposite side is rejected without mutation.
    pub fn apply_delta(&mut self, delta: &BookDelta) -> Result<bool, BookError> {
        if !delta.price.is_positive() {
            return Err(BookError::InvalidPrice {
                side: delta.side,
                price: delta.price,
            });
        }
        Self::validate_side(delta.side, delta.price, delta.size)?;

        let (side, opposite) = match delta.side {
            Side::Bid => (&mut self.bids, &self.asks),
            Side::Ask => (&mut self.asks, &self.bids),
        };
        if delta.size.is_positive() && side.crosses(delta.price, opposite) {
            let opposite_best = opposite.best().map(|(p, _)| p);
            return Err(match delta.side {
                Side::Bid => BookError::CrossedBook {
                    bid: Some(delta.price),
                    ask: opposite_best,
                },
                Side::Ask => BookError::CrossedBook {
                    bid: opposite_best,
                    ask: Some(delta.price),
                },
            });
        }

        let changed = side.upsert(delta.price, delta.size);
        if changed {
            self.last_update = delta.ts;
        }
        Ok(changed)
    }

    /// Get the best bid price and size
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<(Px, Qty)> {
        self.bids.best()
    }

    /// Get the best ask price and size
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<(Px, Qty)> {
        self.asks.best()
    }

    /// Best bid/offer snapshot, `None` unless both sides are quoted
    #[must_use]
    pub fn top_of_book(&self) -> Option<TopOfBook> {
        let (bid_price, bid_size) = self.best_bid()?;
        let (ask_price, ask_size) = self.best_ask()?;
        Some(TopOfBook {
            ts: self.last_update,
            symbol: self.symbol,
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        })
    }

    /// Mid price (average of best bid and ask)
    #[inline]
    #[must_use]
    pub fn mid(&self) -> Option<Px> {
        self.top_of_book().map(|t| t.mid())
    }

    /// Microprice (size-weighted mid)
    #[inline]
    #[must_use]
    pub fn microprice(&self) -> Option<Px> {
        self.top_of_book().map(|t| t.microprice())
    }

    /// Spread in ticks
    #[inline]
    #[must_use]
    pub fn spread_ticks(&self) -> Option<i64> {
        self.top_of_book().map(|t| t.spread().as_i64())
    }

    /// Order book imbalance over `depth` levels
    /// Returns value between -1.0 (all on ask) and 1.0 (all on bid)
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn imbalance(&self, depth: usize) -> Option<f64> {
        let bid_qty = self.bids.total_qty(depth).as_i64();
        let ask_qty = self.asks.total_qty(depth).as_i64();
        let total = bid_qty + ask_qty;

        if total > 0 {
            Some((bid_qty - ask_qty) as f64 / total as f64)
        } else {
            None
        }
    }

    /// Check if book is crossed (bid >= ask)
    #[inline]
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Recent ticks, oldest first, for gap recovery
    pub fn recent_updates(&self) -> impl ExactSizeIterator<Item = &TickUpdate> {
        self.recent.iter()
    }

    /// Whether a sequence gap is awaiting recovery
    #[must_use]
    pub const fn recovery_pending(&self) -> bool {
        self.recovery_pending
    }

    /// Mark recovery as done
    pub fn clear_recovery(&mut self) {
        self.recovery_pending = false;
    }

    /// Get a hash of the book state for deterministic verification
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn state_hash(&self) -> u64 {
        let mut hash = 0u64;

        for side in [&self.bids, &self.asks] {
            for i in 0..side.depth.min(DEPTH) {
                hash = hash.wrapping_mul(31).wrapping_add(side.prices[i].as_i64() as u64);
                hash = hash.wrapping_mul(31).wrapping_add(side.qtys[i].as_i64() as u64);
            }
        }

        hash.wrapping_mul(31).wrapping_add(self.sequence)
    }
}

/// Error types for order book operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    /// Book would be crossed after update
    #[error("crossed book: bid={bid:?} >= ask={ask:?}")]
    CrossedBook {
        /// Best bid that would cross
        bid: Option<Px>,
        /// Best ask that would cross
        ask: Option<Px>,
    },

    /// Quoted size with a non-positive price
    #[error("invalid {side} price {price}")]
    InvalidPrice {
        /// Side of the bad price
        side: Side,
        /// Offending price
        price: Px,
    },

    /// Negative size
    #[error("negative {side} size {size}")]
    NegativeSize {
        /// Side of the bad size
        side: Side,
        /// Offending size
        size: Qty,
    },

    /// Sequence not beyond the last applied one
    #[error("stale sequence {received}, last applied {last}")]
    StaleSequence {
        /// Last applied sequence
        last: u64,
        /// Sequence on the rejected tick
        received: u64,
    },
}

impl BookError {
    /// Counter label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CrossedBook { .. } => "crossed",
            Self::InvalidPrice { .. } => "invalid_price",
            Self::NegativeSize { .. } => "negative_size",
            Self::StaleSequence { .. } => "stale_sequence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn tick(seq: u64, bid: f64, bid_sz: f64, ask: f64, ask_sz: f64) -> TickUpdate {
        TickUpdate {
            ts: Ts::from_millis(seq * 10),
            symbol: Symbol::new(1),
            bid_price: Px::new(bid),
            bid_size: Qty::new(bid_sz),
            ask_price: Px::new(ask),
            ask_size: Qty::new(ask_sz),
            sequence: seq,
        }
    }

    #[test]
    fn test_first_tick_emits_top_of_book() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        let outcome = book.apply_tick(&tick(1, 100.0, 1.0, 102.0, 1.0))?;

        let top = outcome.top.expect("two-sided tick yields a top of book");
        assert_eq!(top.mid(), Px::new(101.0));
        assert_eq!(top.spread(), Px::new(2.0));
        assert_eq!(top.microprice(), Px::new(101.0));
        assert_eq!(outcome.deltas.len(), 2);
        assert_eq!(outcome.gap, None);
        assert_eq!(book.sequence, 1);
        Ok(())
    }

    #[test]
    fn test_one_sided_book_emits_nothing() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        let outcome = book.apply_tick(&tick(1, 100.0, 1.0, 0.0, 0.0))?;
        assert_eq!(outcome.top, None);
        assert_eq!(book.best_bid(), Some((Px::new(100.0), Qty::new(1.0))));
        assert!(book.best_ask().is_none());
        Ok(())
    }

    #[test]
    fn test_crossed_tick_rejected_without_mutation() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        book.apply_tick(&tick(1, 100.0, 1.0, 102.0, 1.0))?;
        let hash = book.state_hash();

        let result = book.apply_tick(&tick(2, 103.0, 1.0, 102.0, 1.0));
        assert!(matches!(result, Err(BookError::CrossedBook { .. })));
        assert_eq!(book.state_hash(), hash);
        assert_eq!(book.sequence, 1);
        assert_eq!(book.recent_updates().len(), 1);
        Ok(())
    }

    #[test]
    fn test_stale_and_duplicate_ticks_dropped() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        book.apply_tick(&tick(5, 100.0, 1.0, 102.0, 1.0))?;

        assert_eq!(
            book.apply_tick(&tick(5, 100.0, 2.0, 102.0, 1.0)),
            Err(BookError::StaleSequence { last: 5, received: 5 })
        );
        assert_eq!(
            book.apply_tick(&tick(3, 100.0, 2.0, 102.0, 1.0)),
            Err(BookError::StaleSequence { last: 5, received: 3 })
        );
        assert_eq!(book.best_bid(), Some((Px::new(100.0), Qty::new(1.0))));
        Ok(())
    }

    #[test]
    fn test_gap_flags_recovery_and_still_applies() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        book.apply_tick(&tick(1, 100.0, 1.0, 102.0, 1.0))?;
        let outcome = book.apply_tick(&tick(4, 101.0, 1.0, 103.0, 1.0))?;

        assert_eq!(outcome.gap, Some(SequenceGap { expected: 2, received: 4 }));
        assert_eq!(outcome.gap.map(|g| g.missing()), Some(2));
        assert!(book.recovery_pending());
        assert_eq!(book.mid(), Some(Px::new(102.0)));

        book.clear_recovery();
        assert!(!book.recovery_pending());
        Ok(())
    }

    #[test]
    fn test_tick_deltas_remove_stale_level() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        book.apply_tick(&tick(1, 100.0, 1.0, 102.0, 1.0))?;

        // Bid drops to 99, ask unchanged
        let outcome = book.apply_tick(&tick(2, 99.0, 2.0, 102.0, 1.0))?;
        let deltas: Vec<(Side, Px, Qty)> =
            outcome.deltas.iter().map(|d| (d.side, d.price, d.size)).collect();
        assert_eq!(
            deltas,
            vec![
                (Side::Bid, Px::new(100.0), Qty::ZERO),
                (Side::Bid, Px::new(99.0), Qty::new(2.0)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_improving_tick_replaces_level() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        book.apply_tick(&tick(1, 100.0, 1.0, 102.0, 1.0))?;

        // Bid lifts to 101, ask unchanged
        let outcome = book.apply_tick(&tick(2, 101.0, 1.0, 102.0, 1.0))?;
        let deltas: Vec<(Side, Px, Qty)> =
            outcome.deltas.iter().map(|d| (d.side, d.price, d.size)).collect();
        assert_eq!(
            deltas,
            vec![
                (Side::Bid, Px::new(100.0), Qty::ZERO),
                (Side::Bid, Px::new(101.0), Qty::new(1.0)),
            ]
        );
        assert_eq!(book.bids.depth, 1);
        assert_eq!(book.best_bid(), Some((Px::new(101.0), Qty::new(1.0))));
        Ok(())
    }

    fn levels(side: &SideBook) -> Vec<(Px, Qty)> {
        (0..side.depth).filter_map(|i| side.level(i)).collect()
    }

    proptest! {
        #[test]
        fn prop_tick_deltas_rebuild_book(
            quotes in prop::collection::vec((1i64..500, 1i64..20, 0i64..4, 0i64..4), 1..60)
        ) {
            let mut book = OrderBook::new(Symbol::new(1));
            let mut bids = SideBook::new(Side::Bid);
            let mut asks = SideBook::new(Side::Ask);

            for (seq, (bid, spread, bid_size, ask_size)) in (1u64..).zip(quotes) {
                let update = TickUpdate {
                    ts: Ts::from_millis(seq),
                    symbol: Symbol::new(1),
                    bid_price: Px::from_i64(bid),
                    bid_size: Qty::from_i64(bid_size),
                    ask_price: Px::from_i64(bid + spread),
                    ask_size: Qty::from_i64(ask_size),
                    sequence: seq,
                };
                let outcome = book.apply_tick(&update);
                prop_assert!(outcome.is_ok());
                for delta in outcome.map(|o| o.deltas).unwrap_or_default() {
                    match delta.side {
                        Side::Bid => bids.upsert(delta.price, delta.size),
                        Side::Ask => asks.upsert(delta.price, delta.size),
                    };
                }

                prop_assert!(book.bids.depth <= 1 && book.asks.depth <= 1);
                prop_assert_eq!(levels(&bids), levels(&book.bids));
                prop_assert_eq!(levels(&asks), levels(&book.asks));
            }
        }
    }

    #[test]
    fn test_recent_ring_is_bounded() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        for seq in 1..=(RECENT_UPDATES as u64 + 5) {
            book.apply_tick(&tick(seq, 100.0, 1.0, 102.0, 1.0))?;
        }
        assert_eq!(book.recent_updates().len(), RECENT_UPDATES);
        assert_eq!(book.recent_updates().next().map(|t| t.sequence), Some(6));
        Ok(())
    }

    #[test]
    fn test_delta_builds_depth() -> Result<(), BookError> {
        let mut book = OrderBook::new(Symbol::new(1));
        let delta = |side, price: f64, size: f64| BookDelta {
            ts: Ts::from_nanos(1),
            symbol: Symbol::new(1),
            side,
            price: Px::new(price),
            size: Qty::new(size),
        };

        assert!(book.apply_delta(&delta(Side::Bid, 99.5, 100.0))?);
        assert!(book.apply_delta(&delta(Side::Bid, 99.4, 200.0))?);
        assert!(book.apply_delta(&delta(Side::Ask, 100.5, 50.0))?);

        assert_eq!(book.bids.depth, 2);
        let imbalance = book.imbalance(5).unwrap_or_default();
        // (300 - 50) / 350
        assert!((imbalance - 250.0 / 350.0).abs() < 1e-9);

        let crossing = book.apply_delta(&delta(Side::Bid, 100.5, 1.0));
        assert!(matches!(crossing, Err(BookError::CrossedBook { .. })));
        assert!(!book.is_crossed());

        assert!(book.apply_delta(&delta(Side::Bid, 99.5, 0.0))?);
        assert_eq!(book.best_bid(), Some((Px::new(99.4), Qty::new(200.0))));
        Ok(())
    }

    #[test]
    fn test_state_hash_deterministic() -> Result<(), BookError> {
        let ticks = [
            tick(1, 99.5, 100.0, 100.5, 150.0),
            tick(2, 99.4, 200.0, 100.5, 150.0),
            tick(3, 99.6, 10.0, 100.4, 15.0),
        ];
        let mut a = OrderBook::new(Symbol::new(1));
        let mut b = OrderBook::new(Symbol::new(1));
        for t in &ticks {
            a.apply_tick(t)?;
            b.apply_tick(t)?;
        }
        assert_eq!(a.state_hash(), b.state_hash());
        Ok(())
    }
}
