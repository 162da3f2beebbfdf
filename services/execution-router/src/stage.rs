//! Router stage: approved intents in, venue-addressed orders out

use crate::router::{RouteDecision, SmartRouter};
use bus::Message;
use common::Reject;
use services_common::{Context, Stage, StageError, StageMetrics};
use tracing::{debug, info, warn};

/// Single-instance router stage
pub struct RouterStage {
    router: SmartRouter,
}

impl RouterStage {
    /// Stage around a configured router
    #[must_use]
    pub const fn new(router: SmartRouter) -> Self {
        Self { router }
    }

    /// Underlying router
    #[must_use]
    pub const fn router(&self) -> &SmartRouter {
        &self.router
    }
}

impl Stage for RouterStage {
    fn name(&self) -> &str {
        "router"
    }

    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
        let intent = match message {
            Message::Approved(intent) => intent,
            other => {
                return Err(StageError::UnexpectedMessage {
                    stage: "router",
                    kind: other.kind(),
                });
            }
        };

        match self.router.route(&intent) {
            RouteDecision::Routed(order) => {
                debug!(
                    client_id = %intent.client_id,
                    symbol = %intent.symbol,
                    venue = %order.venue,
                    "order routed"
                );
                ctx.metrics.incr("routed");
                ctx.emit(Message::Routed(order));
            }
            RouteDecision::Throttled { venue, wait_ns } => {
                warn!(
                    client_id = %intent.client_id,
                    symbol = %intent.symbol,
                    %venue,
                    wait_ns,
                    "venue throttled, order dropped"
                );
                ctx.metrics.incr("throttled");
            }
            RouteDecision::Refused { reason, detail } => {
                warn!(
                    client_id = %intent.client_id,
                    symbol = %intent.symbol,
                    reason_code = reason.code(),
                    reason = %detail,
                    "order not routable"
                );
                ctx.metrics.incr("refused");
                ctx.emit(Message::Reject(Reject::new(self.router.now(), &intent, reason, detail)));
            }
        }
        Ok(())
    }

    fn on_stop(&mut self, metrics: &StageMetrics) {
        info!(
            routed = metrics.counter("routed"),
            throttled = metrics.counter("throttled"),
            refused = metrics.counter("refused"),
            "router stage stopped"
        );
    }
}
