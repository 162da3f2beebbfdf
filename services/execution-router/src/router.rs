//! Venue selection and per-venue throttling

use crate::config::{RouterConfig, RouterConfigError};
use common::{Clock, OrderIntent, RejectReason, RoutedOrder, Symbol, SymbolRegistry, Ts, VenueCode};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Result of routing one approved intent
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Stamped with a venue, ready for `routed.<venue>`
    Routed(RoutedOrder),
    /// Venue was used too recently; the intent is dropped
    Throttled {
        /// Selected venue
        venue: VenueCode,
        /// Time left until the venue accepts another order
        wait_ns: u64,
    },
    /// No usable venue
    Refused {
        /// 201 or 202
        reason: RejectReason,
        /// Human-readable detail
        detail: String,
    },
}

/// Router state: venue table plus the last routing time per venue
///
/// The throttle runs on intent event time, so a replay routes the same way
/// however its tasks are scheduled. The clock only stamps `routed_ts`.
pub struct SmartRouter {
    venues: Vec<VenueCode>,
    table: FxHashMap<Symbol, VenueCode>,
    min_delay_ns: u64,
    last_routed: FxHashMap<VenueCode, Ts>,
    clock: Arc<dyn Clock>,
}

impl SmartRouter {
    /// Build from configuration, resolving symbol names through `registry`
    pub fn new(
        config: &RouterConfig,
        registry: &dyn SymbolRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RouterConfigError> {
        config.validate(registry)?;
        Ok(Self {
            venues: config.venues.clone(),
            table: config.symbol_table(registry)?,
            min_delay_ns: config.min_delay_ns(),
            last_routed: FxHashMap::default(),
            clock,
        })
    }

    /// Current time on the router's clock
    #[must_use]
    pub fn now(&self) -> Ts {
        self.clock.now()
    }

    /// Route hint, then the symbol table, then the first configured venue
    #[must_use]
    pub fn select_venue(&self, intent: &OrderIntent) -> Option<VenueCode> {
        intent
            .route_hint
            .or_else(|| self.table.get(&intent.symbol).copied())
            .or_else(|| self.venues.first().copied())
    }

    /// Event time of the last order `venue` accepted
    #[must_use]
    pub fn last_routed(&self, venue: VenueCode) -> Option<Ts> {
        self.last_routed.get(&venue).copied()
    }

    /// Pick a venue, apply the throttle and stamp the order
    pub fn route(&mut self, intent: &OrderIntent) -> RouteDecision {
        let Some(venue) = self.select_venue(intent) else {
            return RouteDecision::Refused {
                reason: RejectReason::NoRoute,
                detail: format!("no venue for symbol {}", intent.symbol),
            };
        };
        if !self.venues.contains(&venue) {
            return RouteDecision::Refused {
                reason: RejectReason::VenueUnavailable,
                detail: format!("venue {venue} not configured"),
            };
        }

        if let Some(last) = self.last_routed.get(&venue) {
            let elapsed = intent.ts.saturating_since(*last);
            if elapsed < self.min_delay_ns {
                return RouteDecision::Throttled {
                    venue,
                    wait_ns: self.min_delay_ns - elapsed,
                };
            }
        }

        self.last_routed.insert(venue, intent.ts);
        RouteDecision::Routed(RoutedOrder {
            intent: intent.clone(),
            venue,
            routed_ts: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::constants::NANOS_PER_MILLI;
    use common::{ManualClock, Side};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use crate::config::SymbolRoute;
    use test_utils::{IntentFactory, clock, registry};

    fn router(config: &RouterConfig, clock: &ManualClock) -> SmartRouter {
        match SmartRouter::new(config, &registry(), Arc::new(clock.clone())) {
            Ok(router) => router,
            Err(e) => panic!("router config rejected: {e}"),
        }
    }

    fn config() -> RouterConfig {
        RouterConfig {
            venues: vec![VenueCode::Binance, VenueCode::Coinbase],
            routes: vec![SymbolRoute::new("ETHUSDT", VenueCode::Coinbase)],
            ..RouterConfig::default()
        }
    }

    #[rstest]
    #[case::hint_wins(2, Some(VenueCode::Binance), VenueCode::Binance)]
    #[case::table(2, None, VenueCode::Coinbase)]
    #[case::first_configured(1, None, VenueCode::Binance)]
    fn test_venue_selection(
        clock: ManualClock,
        #[case] symbol: u32,
        #[case] hint: Option<VenueCode>,
        #[case] expected: VenueCode,
    ) {
        let mut router = router(&config(), &clock);
        let factory = match hint {
            Some(venue) => IntentFactory::new(symbol).with_hint(venue),
            None => IntentFactory::new(symbol),
        };
        let intent = factory.limit(Side::Bid, 1.0, 100.0);
        let RouteDecision::Routed(order) = router.route(&intent) else {
            panic!("intent was not routed");
        };
        assert_eq!(order.venue, expected);
        assert_eq!(order.routed_ts, clock.now());
        assert_eq!(order.intent, intent);
    }

    #[rstest]
    fn test_unconfigured_hint_refused(clock: ManualClock) {
        let mut router = router(&config(), &clock);
        let intent = IntentFactory::new(1)
            .with_hint(VenueCode::Kraken)
            .limit(Side::Bid, 1.0, 100.0);
        assert!(matches!(
            router.route(&intent),
            RouteDecision::Refused {
                reason: RejectReason::VenueUnavailable,
                ..
            }
        ));
    }

    #[rstest]
    fn test_no_venue_at_all(clock: ManualClock) {
        let empty = RouterConfig {
            venues: vec![],
            ..RouterConfig::default()
        };
        let mut router = router(&empty, &clock);
        let intent = IntentFactory::new(1).limit(Side::Bid, 1.0, 100.0);
        assert!(matches!(
            router.route(&intent),
            RouteDecision::Refused {
                reason: RejectReason::NoRoute,
                ..
            }
        ));
    }

    #[rstest]
    fn test_throttle_per_venue(clock: ManualClock) {
        let mut router = router(&config(), &clock);
        let btc = |ms| IntentFactory::new(1).at_millis(ms).limit(Side::Bid, 1.0, 100.0);
        let eth = |ms| IntentFactory::new(2).at_millis(ms).limit(Side::Bid, 1.0, 100.0);

        assert!(matches!(router.route(&btc(0)), RouteDecision::Routed(_)));
        assert_eq!(
            router.route(&btc(40)),
            RouteDecision::Throttled {
                venue: VenueCode::Binance,
                wait_ns: 60 * NANOS_PER_MILLI,
            }
        );
        // Coinbase has its own budget
        assert!(matches!(router.route(&eth(40)), RouteDecision::Routed(_)));

        // A throttled order does not move the venue's last-routed time
        assert!(matches!(router.route(&btc(100)), RouteDecision::Routed(_)));
        assert_eq!(router.last_routed(VenueCode::Binance), Some(Ts::from_millis(100)));
    }

    #[rstest]
    fn test_throttle_ignores_wall_clock(clock: ManualClock) {
        let mut router = router(&config(), &clock);
        let intent = |ms| IntentFactory::new(1).at_millis(ms).limit(Side::Bid, 1.0, 100.0);

        assert!(matches!(router.route(&intent(0)), RouteDecision::Routed(_)));
        // Router clock racing ahead does not open the venue early
        clock.advance(10_000 * NANOS_PER_MILLI);
        assert!(matches!(router.route(&intent(50)), RouteDecision::Throttled { .. }));

        // Nor does a stalled clock keep it shut
        let RouteDecision::Routed(order) = router.route(&intent(150)) else {
            panic!("intent past the delay was not routed");
        };
        assert_eq!(order.routed_ts, clock.now());
    }
}
