//! L0 safety gate, L1 reflex rules and L5 arbiter

use crate::config::{ArbiterConfig, ReflexConfig, SafetyConfig};
use common::{FeatureFrame, Px, Qty, Side};

/// Trading action proposed by a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Do nothing
    #[default]
    Hold,
    /// Buy
    Buy,
    /// Sell
    Sell,
}

impl Action {
    /// Order side, `None` for hold
    #[must_use]
    pub const fn side(&self) -> Option<Side> {
        match self {
            Self::Hold => None,
            Self::Buy => Some(Side::Bid),
            Self::Sell => Some(Side::Ask),
        }
    }
}

/// One layer's output
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Verdict {
    /// Proposed action
    pub action: Action,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Verdict {
    /// Hold with zero confidence
    pub const HOLD: Self = Self {
        action: Action::Hold,
        confidence: 0.0,
    };
}

/// Why L0 stopped a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    /// Spread tighter than the floor
    SpreadTooTight,
    /// Spread wider than the ceiling
    SpreadTooWide,
    /// Mid below the minimum price
    PriceTooLow,
    /// Volatility above the ceiling
    VolatilityTooHigh,
}

impl GateFailure {
    /// Counter label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SpreadTooTight => "l0_min_spread",
            Self::SpreadTooWide => "l0_max_spread",
            Self::PriceTooLow => "l0_min_price",
            Self::VolatilityTooHigh => "l0_high_vol",
        }
    }
}

/// Final sized order, L5 output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedOrder {
    /// Order side
    pub side: Side,
    /// Rounded quantity, always positive
    pub qty: Qty,
    /// Limit price
    pub price: Px,
}

/// Single-pass state threaded through the layers for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionContext<'a> {
    /// Frame being decided on
    pub frame: &'a FeatureFrame,
    /// Signed inventory for the frame's symbol
    pub inventory: Qty,
    /// L0 outcome; `true` when L0 is disabled
    pub l0_passed: bool,
    /// L1 verdict
    pub l1: Option<Verdict>,
    /// L2 verdict
    pub l2: Option<Verdict>,
    /// L5 verdict after the confidence floor
    pub final_verdict: Verdict,
    /// Layer whose verdict L5 used
    pub final_layer: u8,
    /// L5 sizing
    pub sized: Option<SizedOrder>,
}

impl<'a> DecisionContext<'a> {
    /// Fresh context for `frame`
    #[must_use]
    pub fn new(frame: &'a FeatureFrame, inventory: Qty) -> Self {
        Self {
            frame,
            inventory,
            l0_passed: true,
            l1: None,
            l2: None,
            final_verdict: Verdict::HOLD,
            final_layer: 0,
            sized: None,
        }
    }
}

/// L0: hard operating bands
pub fn safety_gate(config: &SafetyConfig, frame: &FeatureFrame) -> Result<(), GateFailure> {
    if frame.spread_bps < config.min_spread_bps {
        return Err(GateFailure::SpreadTooTight);
    }
    if frame.spread_bps > config.max_spread_bps {
        return Err(GateFailure::SpreadTooWide);
    }
    if frame.mid.as_f64() < config.min_price {
        return Err(GateFailure::PriceTooLow);
    }
    if frame.realized_vol > config.max_realized_vol {
        return Err(GateFailure::VolatilityTooHigh);
    }
    Ok(())
}

/// L1: mean reversion on imbalance, else momentum, else hold
#[must_use]
pub fn reflex(config: &ReflexConfig, frame: &FeatureFrame, inventory: Qty) -> Verdict {
    let mut verdict = if frame.imbalance.abs() > config.imbalance_threshold {
        Verdict {
            action: if frame.imbalance > 0.0 { Action::Sell } else { Action::Buy },
            confidence: frame.imbalance.abs().min(1.0),
        }
    } else if frame.price_change_pct.abs() > config.momentum_threshold_pct {
        Verdict {
            action: if frame.price_change_pct > 0.0 { Action::Buy } else { Action::Sell },
            confidence: (frame.price_change_pct.abs() / 2.0).min(1.0),
        }
    } else {
        Verdict::HOLD
    };

    // Adding to an existing position is less attractive
    let inventory = inventory.as_i64();
    let adds = matches!(
        (verdict.action, inventory.signum()),
        (Action::Buy, 1) | (Action::Sell, -1)
    );
    if adds {
        verdict.confidence *= config.inventory_skew_factor;
    }
    verdict
}

/// L5: confidence floor and notional sizing at the microprice
#[must_use]
pub fn arbitrate(config: &ArbiterConfig, frame: &FeatureFrame, verdict: Verdict) -> (Verdict, Option<SizedOrder>) {
    let verdict = if verdict.confidence < config.min_confidence {
        Verdict {
            action: Action::Hold,
            confidence: verdict.confidence,
        }
    } else {
        verdict
    };

    let Some(side) = verdict.action.side() else {
        return (verdict, None);
    };
    let mid = frame.mid.as_f64();
    if mid <= 0.0 {
        return (verdict, None);
    }

    let qty = Qty::new(config.max_order_notional * verdict.confidence / mid);
    let sized = qty.is_positive().then_some(SizedOrder {
        side,
        qty,
        price: frame.microprice,
    });
    (verdict, sized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use test_utils::{FrameFactory, assert_approx_eq};

    #[rstest]
    #[case::calm(FrameFactory::new(1, 100.0).build(), Ok(()))]
    #[case::tight(FrameFactory::new(1, 100.0).spread_bps(0.5).build(), Err(GateFailure::SpreadTooTight))]
    #[case::wide(FrameFactory::new(1, 100.0).spread_bps(600.0).build(), Err(GateFailure::SpreadTooWide))]
    #[case::cheap(FrameFactory::new(1, 0.00001).build(), Err(GateFailure::PriceTooLow))]
    #[case::wild(FrameFactory::new(1, 100.0).realized_vol(0.2).build(), Err(GateFailure::VolatilityTooHigh))]
    fn test_safety_gate(#[case] frame: FeatureFrame, #[case] expected: Result<(), GateFailure>) {
        assert_eq!(safety_gate(&SafetyConfig::default(), &frame), expected);
    }

    #[rstest]
    #[case::bid_heavy(0.6, 0.0, Action::Sell, 0.6)]
    #[case::ask_heavy(-0.4, 0.0, Action::Buy, 0.4)]
    #[case::imbalance_wins(0.5, 3.0, Action::Sell, 0.5)]
    #[case::rally(0.1, 1.0, Action::Buy, 0.5)]
    #[case::selloff(0.0, -3.0, Action::Sell, 1.0)]
    #[case::quiet(0.1, 0.2, Action::Hold, 0.0)]
    fn test_reflex_rules(
        #[case] imbalance: f64,
        #[case] momentum: f64,
        #[case] action: Action,
        #[case] confidence: f64,
    ) {
        let frame = FrameFactory::new(1, 100.0).imbalance(imbalance).momentum_pct(momentum).build();
        let verdict = reflex(&ReflexConfig::default(), &frame, Qty::ZERO);
        assert_eq!(verdict.action, action);
        assert_approx_eq(verdict.confidence, confidence, 1e-12);
    }

    #[test]
    fn test_inventory_skew_only_when_adding() {
        let frame = FrameFactory::new(1, 100.0).imbalance(-0.8).build();
        let config = ReflexConfig::default();

        let long = reflex(&config, &frame, Qty::new(2.0));
        assert_eq!(long.action, Action::Buy);
        assert_approx_eq(long.confidence, 0.4, 1e-12);

        let short = reflex(&config, &frame, Qty::new(-2.0));
        assert_approx_eq(short.confidence, 0.8, 1e-12);
    }

    #[test]
    fn test_arbiter_sizes_by_confidence() {
        let frame = FrameFactory::new(1, 100.0).microprice(100.02).build();
        let config = ArbiterConfig::default();

        let (verdict, sized) = arbitrate(&config, &frame, Verdict { action: Action::Buy, confidence: 0.8 });
        assert_eq!(verdict.action, Action::Buy);
        assert_eq!(
            sized,
            Some(SizedOrder {
                side: Side::Bid,
                qty: Qty::new(4.0),
                price: Px::new(100.02),
            })
        );

        let (verdict, sized) = arbitrate(&config, &frame, Verdict { action: Action::Sell, confidence: 0.49 });
        assert_eq!(verdict.action, Action::Hold);
        assert_eq!(sized, None);
    }

    proptest! {
        #[test]
        fn prop_tighter_bands_never_admit_more(
            mid in 0.01f64..200.0,
            spread_bps in 0.0f64..800.0,
            vol in 0.0f64..0.3,
            min_price in 0.0f64..100.0,
            tighten_floor in 0.0f64..10.0,
            tighten_ceiling in 0.0f64..200.0,
            tighten_price in 0.0f64..100.0,
            tighten_vol in 0.0f64..0.05,
        ) {
            let frame = FrameFactory::new(1, mid).spread_bps(spread_bps).realized_vol(vol).build();
            let loose = SafetyConfig {
                min_price,
                ..SafetyConfig::default()
            };
            let tight = SafetyConfig {
                min_spread_bps: loose.min_spread_bps + tighten_floor,
                max_spread_bps: loose.max_spread_bps - tighten_ceiling,
                min_price: loose.min_price + tighten_price,
                max_realized_vol: loose.max_realized_vol - tighten_vol,
            };
            if safety_gate(&tight, &frame).is_ok() {
                prop_assert!(safety_gate(&loose, &frame).is_ok());
            }
        }
    }
}
