//! Feature stage: top-of-book and signals in, feature frames out

use crate::engine::{FeatureConfig, FeatureEngine};
use bus::Message;
use services_common::{Context, Stage, StageError, StageMetrics};
use tracing::{debug, info};

/// Single-instance feature stage over every book shard
pub struct FeatureStage {
    engine: FeatureEngine,
}

impl FeatureStage {
    /// Stage with the given window
    #[must_use]
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            engine: FeatureEngine::new(config),
        }
    }

    /// Underlying engine
    #[must_use]
    pub const fn engine(&self) -> &FeatureEngine {
        &self.engine
    }
}

impl Stage for FeatureStage {
    fn name(&self) -> &str {
        "features"
    }

    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
        match message {
            Message::TopOfBook(top) => {
                let frame = self.engine.apply(&top).map_err(|e| {
                    ctx.metrics.incr("out_of_order");
                    StageError::invalid("top of book", e.to_string())
                })?;
                ctx.emit(Message::Features(frame));
                Ok(())
            }
            // Deltas share the book channel; the window only needs the top
            Message::BookDelta(_) => Ok(()),
            Message::Signal(signal) => {
                let regime = self.engine.apply_signal(&signal);
                debug!(symbol = %signal.symbol, sig_type = ?signal.sig_type, value = signal.value, %regime, "regime updated");
                ctx.metrics.incr("signals");
                Ok(())
            }
            other => Err(StageError::UnexpectedMessage {
                stage: "features",
                kind: other.kind(),
            }),
        }
    }

    fn on_stop(&mut self, metrics: &StageMetrics) {
        info!(
            signals = metrics.counter("signals"),
            out_of_order = metrics.counter("out_of_order"),
            "feature stage stopped"
        );
    }
}
