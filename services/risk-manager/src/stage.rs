//! Risk stage: intents in, approvals or rejects out

use crate::engine::{RiskEngine, RiskVerdict};
use crate::limits::RiskLimits;
use bus::Message;
use common::Reject;
use services_common::{Context, Stage, StageError, StageMetrics};
use tracing::{info, warn};

/// Single-instance risk stage; every intent is evaluated exactly once
pub struct RiskStage {
    engine: RiskEngine,
}

impl RiskStage {
    /// Stage from a limits snapshot
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            engine: RiskEngine::new(limits),
        }
    }

    /// Underlying engine
    #[must_use]
    pub const fn engine(&self) -> &RiskEngine {
        &self.engine
    }
}

impl Stage for RiskStage {
    fn name(&self) -> &str {
        "risk"
    }

    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
        let intent = match message {
            Message::Intent(intent) => intent,
            other => {
                return Err(StageError::UnexpectedMessage {
                    stage: "risk",
                    kind: other.kind(),
                });
            }
        };

        match self.engine.check(&intent) {
            RiskVerdict::Approved => {
                info!(
                    client_id = %intent.client_id,
                    symbol = %intent.symbol,
                    side = %intent.side,
                    qty = %intent.qty,
                    "order approved"
                );
                ctx.metrics.incr("approved");
                ctx.emit(Message::Approved(intent));
            }
            RiskVerdict::Rejected { reason, detail } => {
                warn!(
                    client_id = %intent.client_id,
                    symbol = %intent.symbol,
                    reason_code = reason.code(),
                    reason = %detail,
                    "order rejected"
                );
                ctx.metrics.incr("rejected");
                ctx.emit(Message::Reject(Reject::new(intent.ts, &intent, reason, detail)));
            }
        }
        Ok(())
    }

    fn on_stop(&mut self, metrics: &StageMetrics) {
        info!(
            approved = metrics.counter("approved"),
            rejected = metrics.counter("rejected"),
            "risk stage stopped"
        );
    }
}
