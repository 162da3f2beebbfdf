//! Decision stage: feature frames and fills in, order intents out

use crate::config::DecisionConfig;
use crate::engine::{Decision, DecisionEngine};
use bus::Message;
use services_common::{Context, Stage, StageError, StageMetrics};
use tracing::{debug, info};

/// Single-instance decision stage
pub struct DecisionStage {
    engine: DecisionEngine,
}

impl DecisionStage {
    /// Stage from a config snapshot
    #[must_use]
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            engine: DecisionEngine::new(config),
        }
    }

    /// Stage around a prepared engine
    #[must_use]
    pub const fn with_engine(engine: DecisionEngine) -> Self {
        Self { engine }
    }

    /// Underlying engine
    #[must_use]
    pub const fn engine(&self) -> &DecisionEngine {
        &self.engine
    }
}

impl Stage for DecisionStage {
    fn name(&self) -> &str {
        "decision"
    }

    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
        match message {
            Message::Features(frame) => {
                match self.engine.decide(&frame) {
                    Decision::Gated(failure) => ctx.metrics.incr(failure.as_str()),
                    Decision::Hold(_) => ctx.metrics.incr("holds"),
                    Decision::Order(intent) => {
                        info!(
                            symbol = %intent.symbol,
                            client_id = %intent.client_id,
                            side = %intent.side,
                            qty = %intent.qty,
                            price = ?intent.price,
                            layer = intent.decision_layer,
                            confidence = intent.confidence,
                            "order intent generated"
                        );
                        ctx.metrics.incr("intents");
                        ctx.emit(Message::Intent(intent));
                    }
                }
                Ok(())
            }
            Message::Fill(fill) => {
                let position = self.engine.on_fill(&fill);
                debug!(symbol = %fill.symbol, client_id = %fill.client_id, %position, "inventory updated");
                ctx.metrics.incr("fills");
                Ok(())
            }
            other => Err(StageError::UnexpectedMessage {
                stage: "decision",
                kind: other.kind(),
            }),
        }
    }

    fn on_stop(&mut self, metrics: &StageMetrics) {
        info!(
            intents = metrics.counter("intents"),
            holds = metrics.counter("holds"),
            fills = metrics.counter("fills"),
            "decision stage stopped"
        );
    }
}
