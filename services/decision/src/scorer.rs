//! L2 scoring overlay

use crate::config::ScorerConfig;
use crate::layers::{DecisionContext, Verdict};

/// Pluggable L2 model
///
/// Scorers see the context read-only; any adjustment travels back through the
/// returned verdict.
pub trait Scorer: Send + Sync {
    /// Model label for logs
    fn name(&self) -> &str;

    /// Adjust the L1 verdict
    fn score(&self, ctx: &DecisionContext<'_>, l1: Verdict) -> Verdict;
}

/// Returns L1's verdict untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughScorer;

impl Scorer for PassThroughScorer {
    fn name(&self) -> &str {
        "pass_through"
    }

    fn score(&self, _ctx: &DecisionContext<'_>, l1: Verdict) -> Verdict {
        l1
    }
}

/// Scales confidence and discounts it by realized volatility
#[derive(Debug, Clone, Copy)]
pub struct LinearScorer {
    scale: f64,
    vol_penalty: f64,
}

impl LinearScorer {
    /// `confidence * scale - vol_penalty * realized_vol`, clamped to [0, 1]
    #[must_use]
    pub const fn new(scale: f64, vol_penalty: f64) -> Self {
        Self { scale, vol_penalty }
    }
}

impl Scorer for LinearScorer {
    fn name(&self) -> &str {
        "linear"
    }

    fn score(&self, ctx: &DecisionContext<'_>, l1: Verdict) -> Verdict {
        let confidence = l1.confidence * self.scale - self.vol_penalty * ctx.frame.realized_vol;
        Verdict {
            action: l1.action,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Build the scorer named by `config`
#[must_use]
pub fn build_scorer(config: &ScorerConfig) -> Box<dyn Scorer> {
    match *config {
        ScorerConfig::PassThrough => Box::new(PassThroughScorer),
        ScorerConfig::Linear { scale, vol_penalty } => Box::new(LinearScorer::new(scale, vol_penalty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Action;
    use common::Qty;
    use test_utils::{FrameFactory, assert_approx_eq};

    #[test]
    fn test_linear_discounts_volatility() {
        let frame = FrameFactory::new(1, 100.0).realized_vol(0.05).build();
        let ctx = DecisionContext::new(&frame, Qty::ZERO);
        let scorer = build_scorer(&ScorerConfig::Linear { scale: 0.9, vol_penalty: 2.0 });
        let verdict = scorer.score(&ctx, Verdict { action: Action::Buy, confidence: 1.0 });
        assert_eq!(scorer.name(), "linear");
        assert_eq!(verdict.action, Action::Buy);
        assert_approx_eq(verdict.confidence, 0.8, 1e-12);
    }

    #[test]
    fn test_pass_through_is_identity() {
        let frame = FrameFactory::new(1, 100.0).build();
        let ctx = DecisionContext::new(&frame, Qty::ZERO);
        let l1 = Verdict { action: Action::Sell, confidence: 0.7 };
        assert_eq!(PassThroughScorer.score(&ctx, l1), l1);
    }
}
