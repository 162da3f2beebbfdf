//! Layer pipeline for one feature frame

use crate::config::DecisionConfig;
use crate::layers::{DecisionContext, GateFailure, Verdict, arbitrate, reflex, safety_gate};
use crate::scorer::{Scorer, build_scorer};
use common::{ClientId, FeatureFrame, Fill, OrderIntent, OrderType, Qty, Symbol, TimeInForce};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Result of running the layers on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// L0 stopped the frame
    Gated(GateFailure),
    /// No order; carries the final verdict
    Hold(Verdict),
    /// Order to send to risk
    Order(OrderIntent),
}

/// L0-L5 decision pipeline with per-symbol inventory
pub struct DecisionEngine {
    config: DecisionConfig,
    scorer: Box<dyn Scorer>,
    inventory: FxHashMap<Symbol, Qty>,
}

impl DecisionEngine {
    /// Engine with the scorer named in `config`
    #[must_use]
    pub fn new(config: DecisionConfig) -> Self {
        let scorer = build_scorer(&config.scorer);
        Self::with_scorer(config, scorer)
    }

    /// Engine with a custom L2 scorer
    #[must_use]
    pub fn with_scorer(config: DecisionConfig, scorer: Box<dyn Scorer>) -> Self {
        Self {
            config,
            scorer,
            inventory: FxHashMap::default(),
        }
    }

    /// Signed inventory for `symbol`
    #[must_use]
    pub fn inventory(&self, symbol: Symbol) -> Qty {
        self.inventory.get(&symbol).copied().unwrap_or(Qty::ZERO)
    }

    /// Book a fill against inventory
    pub fn on_fill(&mut self, fill: &Fill) -> Qty {
        let position = self.inventory.entry(fill.symbol).or_insert(Qty::ZERO);
        *position = position.saturating_add(fill.qty.signed(fill.side));
        *position
    }

    /// Run the enabled layers in order
    #[must_use]
    pub fn decide(&self, frame: &FeatureFrame) -> Decision {
        let config = &self.config;
        let mut ctx = DecisionContext::new(frame, self.inventory(frame.symbol));

        if config.is_enabled(0) {
            if let Err(failure) = safety_gate(&config.safety, frame) {
                ctx.l0_passed = false;
                debug!(symbol = %frame.symbol, reason = failure.as_str(), spread_bps = frame.spread_bps, "l0 gate closed");
                return Decision::Gated(failure);
            }
        }

        if config.is_enabled(1) {
            ctx.l1 = Some(reflex(&config.reflex, frame, ctx.inventory));
        }

        if config.is_enabled(2) {
            let l1 = ctx.l1.unwrap_or(Verdict::HOLD);
            ctx.l2 = Some(self.scorer.score(&ctx, l1));
        }

        if !config.is_enabled(5) {
            return Decision::Hold(ctx.l2.or(ctx.l1).unwrap_or(Verdict::HOLD));
        }

        let (layer, verdict) = match (ctx.l2, ctx.l1) {
            (Some(l2), _) => (2, l2),
            (None, Some(l1)) => (1, l1),
            (None, None) => (0, Verdict::HOLD),
        };
        let (final_verdict, sized) = arbitrate(&config.arbiter, frame, verdict);
        ctx.final_verdict = final_verdict;
        ctx.final_layer = layer;
        ctx.sized = sized;

        debug!(
            symbol = %frame.symbol,
            l1 = ?ctx.l1,
            l2 = ?ctx.l2,
            action = ?ctx.final_verdict.action,
            confidence = ctx.final_verdict.confidence,
            scorer = self.scorer.name(),
            "decision"
        );

        match ctx.sized {
            Some(sized) => Decision::Order(OrderIntent {
                ts: frame.ts,
                client_id: ClientId::new(),
                symbol: frame.symbol,
                side: sized.side,
                order_type: OrderType::Limit,
                qty: sized.qty,
                price: Some(sized.price),
                time_in_force: TimeInForce::Gtc,
                route_hint: None,
                decision_layer: ctx.final_layer,
                confidence: ctx.final_verdict.confidence,
            }),
            None => Decision::Hold(ctx.final_verdict),
        }
    }
}
