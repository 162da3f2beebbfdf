//! Venue adapter boundary and the paper venue

use crate::config::PaperVenueConfig;
use crate::error::VenueError;
use async_trait::async_trait;
use common::constants::BPS_PER_UNIT;
use common::{AckStatus, Clock, Fill, OrderAck, OrderType, Px, RejectReason, RoutedOrder, TimeInForce, VenueCode};
use std::sync::Arc;

/// What a venue answered for one submission
#[derive(Debug, Clone, PartialEq)]
pub enum VenueReport {
    /// Order accepted, with any immediate executions
    Accepted {
        /// Acknowledgement
        ack: OrderAck,
        /// Executions reported with the ack
        fills: Vec<Fill>,
    },
    /// Order refused by the venue
    Refused {
        /// Venue reason (3xx)
        reason: RejectReason,
        /// Venue message
        detail: String,
    },
}

/// Normalized order submission to one venue
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue this adapter talks to
    fn venue(&self) -> VenueCode;

    /// Submit a routed order
    async fn submit(&self, order: &RoutedOrder) -> Result<VenueReport, VenueError>;
}

/// Simulated venue: acknowledges and fills immediately at the limit price
pub struct PaperVenue {
    venue: VenueCode,
    fee_bps: f64,
    clock: Arc<dyn Clock>,
}

impl PaperVenue {
    /// Paper venue standing in for `venue`
    pub fn new(venue: VenueCode, config: &PaperVenueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            venue,
            fee_bps: config.fee_bps,
            clock,
        }
    }

    fn fee(&self, price: Px, qty: common::Qty) -> Px {
        Px::new(price.notional(qty).as_f64() * self.fee_bps / BPS_PER_UNIT)
    }
}

#[async_trait]
impl VenueAdapter for PaperVenue {
    fn venue(&self) -> VenueCode {
        self.venue
    }

    async fn submit(&self, order: &RoutedOrder) -> Result<VenueReport, VenueError> {
        if order.venue != self.venue {
            return Err(VenueError::WrongVenue {
                expected: self.venue,
                received: order.venue,
            });
        }

        let intent = &order.intent;
        if !intent.qty.is_positive() {
            return Ok(VenueReport::Refused {
                reason: RejectReason::VenueInvalidQuantity,
                detail: format!("quantity {} not positive", intent.qty),
            });
        }
        let price = match intent.price {
            Some(price) if price.is_positive() => price,
            Some(price) => {
                return Ok(VenueReport::Refused {
                    reason: RejectReason::VenueInvalidPrice,
                    detail: format!("price {price} not positive"),
                });
            }
            None => {
                return Ok(VenueReport::Refused {
                    reason: RejectReason::VenueInvalidPrice,
                    detail: "paper venue needs a limit price to fill".to_string(),
                });
            }
        };

        let now = self.clock.now();
        let venue_order_id = format!("SIM-{}", intent.client_id);
        let ack = OrderAck {
            ts: now,
            client_id: intent.client_id,
            venue_order_id: venue_order_id.clone(),
            status: AckStatus::Submitted,
            venue: self.venue,
            submit_ts: order.routed_ts,
        };
        let is_maker = intent.order_type == OrderType::Limit
            && !matches!(intent.time_in_force, TimeInForce::Ioc | TimeInForce::Fok);
        let fill = Fill {
            ts: now,
            client_id: intent.client_id,
            venue_order_id,
            symbol: intent.symbol,
            side: intent.side,
            price,
            qty: intent.qty,
            fee: self.fee(price, intent.qty),
            venue: self.venue,
            is_maker,
            trade_id: format!("TRADE-{}", intent.client_id),
        };
        Ok(VenueReport::Accepted { ack, fills: vec![fill] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ManualClock, Side};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use test_utils::{IntentFactory, clock};

    fn routed(intent: common::OrderIntent, venue: VenueCode, clock: &ManualClock) -> RoutedOrder {
        RoutedOrder {
            intent,
            venue,
            routed_ts: clock.now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_fills_at_limit_with_fee(clock: ManualClock) -> Result<(), VenueError> {
        let venue = PaperVenue::new(VenueCode::Binance, &PaperVenueConfig::default(), Arc::new(clock.clone()));
        let intent = IntentFactory::new(1).limit(Side::Bid, 2.0, 100.0);
        let order = routed(intent.clone(), VenueCode::Binance, &clock);
        clock.advance(250_000);

        let VenueReport::Accepted { ack, fills } = venue.submit(&order).await? else {
            panic!("paper venue refused a valid order");
        };
        assert_eq!(ack.status, AckStatus::Submitted);
        assert_eq!(ack.latency_ns(), 250_000);
        assert_eq!(ack.venue_order_id, format!("SIM-{}", intent.client_id));

        let [fill] = fills.as_slice() else {
            panic!("expected one fill");
        };
        assert_eq!(fill.price, Px::new(100.0));
        assert_eq!(fill.qty, intent.qty);
        // 0.1% of 200
        assert_eq!(fill.fee, Px::new(0.2));
        assert!(fill.is_maker);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_market_order_refused(clock: ManualClock) -> Result<(), VenueError> {
        let venue = PaperVenue::new(VenueCode::Binance, &PaperVenueConfig::default(), Arc::new(clock.clone()));
        let order = routed(IntentFactory::new(1).market(Side::Ask, 1.0), VenueCode::Binance, &clock);
        let report = venue.submit(&order).await?;
        assert!(matches!(
            report,
            VenueReport::Refused {
                reason: RejectReason::VenueInvalidPrice,
                ..
            }
        ));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_wrong_venue_is_an_error(clock: ManualClock) {
        let venue = PaperVenue::new(VenueCode::Binance, &PaperVenueConfig::default(), Arc::new(clock.clone()));
        let order = routed(IntentFactory::new(1).limit(Side::Bid, 1.0, 10.0), VenueCode::Okx, &clock);
        let err = venue.submit(&order).await.err();
        assert_eq!(
            err,
            Some(VenueError::WrongVenue {
                expected: VenueCode::Binance,
                received: VenueCode::Okx
            })
        );
        assert_eq!(err.map(|e| e.reason()), Some(RejectReason::InternalError));
    }
}
