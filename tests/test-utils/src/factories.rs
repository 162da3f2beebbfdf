//! Factory patterns for generating test data

use common::{
    ClientId, FeatureFrame, OrderIntent, OrderType, Px, Qty, RegimeFlags, Side, Symbol,
    TickUpdate, TimeInForce, TopOfBook, Ts, VenueCode,
};

/// Build a tick with unit sizes
pub fn tick(symbol: u32, sequence: u64, bid: f64, ask: f64) -> TickUpdate {
    TickFactory::new(symbol).build(sequence, bid, ask)
}

/// Build a top-of-book snapshot at `ts_ms`
pub fn top_of_book(symbol: u32, ts_ms: u64, bid: f64, ask: f64) -> TopOfBook {
    TopOfBook {
        ts: Ts::from_millis(ts_ms),
        symbol: Symbol::new(symbol),
        bid_price: Px::new(bid),
        bid_size: Qty::new(1.0),
        ask_price: Px::new(ask),
        ask_size: Qty::new(1.0),
    }
}

/// Factory for ticks with customizable sizes and spacing
#[derive(Debug, Clone)]
pub struct TickFactory {
    symbol: Symbol,
    bid_size: Qty,
    ask_size: Qty,
    spacing_ms: u64,
}

impl TickFactory {
    /// Ticks for `symbol`, unit sizes, 10 ms apart
    pub fn new(symbol: u32) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            bid_size: Qty::new(1.0),
            ask_size: Qty::new(1.0),
            spacing_ms: 10,
        }
    }

    /// Override both sizes
    pub fn with_sizes(mut self, bid_size: f64, ask_size: f64) -> Self {
        self.bid_size = Qty::new(bid_size);
        self.ask_size = Qty::new(ask_size);
        self
    }

    /// Override the time between sequences
    pub fn with_spacing_ms(mut self, spacing_ms: u64) -> Self {
        self.spacing_ms = spacing_ms;
        self
    }

    /// Tick number `sequence`, stamped `sequence * spacing` ms
    pub fn build(&self, sequence: u64, bid: f64, ask: f64) -> TickUpdate {
        TickUpdate {
            ts: Ts::from_millis(sequence * self.spacing_ms),
            symbol: self.symbol,
            bid_price: Px::new(bid),
            bid_size: self.bid_size,
            ask_price: Px::new(ask),
            ask_size: self.ask_size,
            sequence,
        }
    }

    /// Consecutive ticks walking the mid through `mids` with a fixed spread
    pub fn build_series(&self, mids: &[f64], spread: f64) -> Vec<TickUpdate> {
        mids.iter()
            .zip(1u64..)
            .map(|(mid, seq)| self.build(seq, mid - spread / 2.0, mid + spread / 2.0))
            .collect()
    }
}

/// Factory for feature frames that pass the default safety gate
#[derive(Debug, Clone)]
pub struct FrameFactory {
    frame: FeatureFrame,
}

impl FrameFactory {
    /// Calm two-sided frame around `mid`
    pub fn new(symbol: u32, mid: f64) -> Self {
        let spread = mid * 0.0005;
        Self {
            frame: FeatureFrame {
                ts: Ts::from_millis(1),
                symbol: Symbol::new(symbol),
                mid: Px::new(mid),
                microprice: Px::new(mid),
                spread: Px::new(spread),
                spread_bps: 5.0,
                bid_volume: Qty::new(1.0),
                ask_volume: Qty::new(1.0),
                imbalance: 0.0,
                realized_vol: 0.001,
                price_range: Px::ZERO,
                price_change: Px::ZERO,
                price_change_pct: 0.0,
                window_len: 1,
                regime: RegimeFlags::NONE,
            },
        }
    }

    /// Set the imbalance
    pub fn imbalance(mut self, imbalance: f64) -> Self {
        self.frame.imbalance = imbalance;
        self
    }

    /// Set the momentum percentage
    pub fn momentum_pct(mut self, pct: f64) -> Self {
        self.frame.price_change_pct = pct;
        self
    }

    /// Set the spread in basis points
    pub fn spread_bps(mut self, bps: f64) -> Self {
        self.frame.spread_bps = bps;
        self
    }

    /// Set the realized volatility
    pub fn realized_vol(mut self, vol: f64) -> Self {
        self.frame.realized_vol = vol;
        self
    }

    /// Set the microprice
    pub fn microprice(mut self, price: f64) -> Self {
        self.frame.microprice = Px::new(price);
        self
    }

    /// Finished frame
    pub fn build(self) -> FeatureFrame {
        self.frame
    }
}

/// Factory for order intents
#[derive(Debug, Clone)]
pub struct IntentFactory {
    symbol: Symbol,
    ts: Ts,
    route_hint: Option<VenueCode>,
}

impl IntentFactory {
    /// Intents for `symbol` at time zero
    pub fn new(symbol: u32) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            ts: Ts::from_nanos(0),
            route_hint: None,
        }
    }

    /// Stamp intents at `ts_ms`
    pub fn at_millis(mut self, ts_ms: u64) -> Self {
        self.ts = Ts::from_millis(ts_ms);
        self
    }

    /// Pin intents to a venue
    pub fn with_hint(mut self, venue: VenueCode) -> Self {
        self.route_hint = Some(venue);
        self
    }

    /// Limit order with a fresh client id
    pub fn limit(&self, side: Side, qty: f64, price: f64) -> OrderIntent {
        OrderIntent {
            ts: self.ts,
            client_id: ClientId::new(),
            symbol: self.symbol,
            side,
            order_type: OrderType::Limit,
            qty: Qty::new(qty),
            price: Some(Px::new(price)),
            time_in_force: TimeInForce::Gtc,
            route_hint: self.route_hint,
            decision_layer: 5,
            confidence: 1.0,
        }
    }

    /// Market order with a fresh client id
    pub fn market(&self, side: Side, qty: f64) -> OrderIntent {
        OrderIntent {
            order_type: OrderType::Market,
            price: None,
            time_in_force: TimeInForce::Ioc,
            ..self.limit(side, qty, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_series_is_sequenced() {
        let ticks = TickFactory::new(1).build_series(&[101.0, 105.0], 2.0);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].sequence, 1);
        assert_eq!(ticks[1].ts, Ts::from_millis(20));
        assert_eq!(ticks[1].bid_price, Px::new(104.0));
    }

    #[test]
    fn test_market_intent_has_no_price() {
        let intent = IntentFactory::new(1).market(Side::Bid, 1.0);
        assert_eq!(intent.order_type, OrderType::Market);
        assert_eq!(intent.price, None);
    }
}
