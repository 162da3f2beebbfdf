//! Execution stage: drives one venue adapter from its `routed.<venue>` channel
//!
//! Submission is async, so this stage owns its loop instead of going through
//! the synchronous `Stage` handler.

use crate::error::VenueError;
use crate::venue::{VenueAdapter, VenueReport};
use bus::{Address, EventBus, EventBusError, Message};
use common::{Clock, Reject, RoutedOrder, Ts};
use services_common::constants::TRANSIENT_BACKOFF;
use services_common::{ErrorKind, Inbox, Outlet, RunFlag, StageError, StageMetrics};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Venue boundary stage for a single adapter
pub struct ExecutionStage {
    name: String,
    adapter: Arc<dyn VenueAdapter>,
    clock: Arc<dyn Clock>,
    inbox: Inbox,
    outlet: Outlet,
    metrics: Arc<StageMetrics>,
    running: RunFlag,
    submit_timeout: Duration,
}

impl ExecutionStage {
    /// Subscribe to the adapter's venue channel
    pub fn new(
        adapter: Arc<dyn VenueAdapter>,
        clock: Arc<dyn Clock>,
        bus: Arc<EventBus<Message>>,
        running: RunFlag,
        submit_timeout: Duration,
    ) -> Result<Self, EventBusError> {
        let venue = adapter.venue();
        let name = format!("execution.{venue}");
        let inbox = Inbox::subscribe(&bus, &[Address::routed(venue)])?;
        Ok(Self {
            metrics: Arc::new(StageMetrics::new(name.clone())),
            outlet: Outlet::new(bus, name.clone()),
            name,
            adapter,
            clock,
            inbox,
            running,
            submit_timeout,
        })
    }

    /// Metrics handle that outlives the stage task
    #[must_use]
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Submit one order and translate the outcome into bus messages
    pub async fn execute(&mut self, order: RoutedOrder) -> Vec<Message> {
        let client_id = order.intent.client_id;
        let outcome = tokio::time::timeout(self.submit_timeout, self.adapter.submit(&order)).await;
        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(stage = %self.name, %client_id, error = %e, "venue submission failed");
                self.metrics.incr("venue_errors");
                let reject = Reject::new(self.clock.now(), &order.intent, e.reason(), e.to_string());
                return vec![Message::Reject(reject)];
            }
            Err(_) => {
                let error = VenueError::Timeout {
                    venue: order.venue,
                    after_ms: u64::try_from(self.submit_timeout.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(stage = %self.name, %client_id, error = %error, "venue submission timed out");
                self.metrics.incr("venue_errors");
                let reject = Reject::new(self.clock.now(), &order.intent, error.reason(), error.to_string());
                return vec![Message::Reject(reject)];
            }
        };

        match report {
            VenueReport::Accepted { ack, fills } => {
                info!(
                    stage = %self.name,
                    %client_id,
                    venue_order_id = %ack.venue_order_id,
                    fills = fills.len(),
                    "order acknowledged"
                );
                self.metrics.incr("acks");
                self.metrics.add("fills", u64::try_from(fills.len()).unwrap_or(u64::MAX));
                std::iter::once(Message::Ack(ack))
                    .chain(fills.into_iter().map(Message::Fill))
                    .collect()
            }
            VenueReport::Refused { reason, detail } => {
                warn!(
                    stage = %self.name,
                    %client_id,
                    reason_code = reason.code(),
                    reason = %detail,
                    "venue rejected order"
                );
                self.metrics.incr("venue_rejects");
                vec![Message::Reject(Reject::new(self.clock.now(), &order.intent, reason, detail))]
            }
        }
    }

    /// Run until the run flag drops or the venue channel closes
    pub async fn run(mut self) -> Result<(), StageError> {
        info!(stage = %self.name, "execution stage started");
        loop {
            if !*self.running.borrow() {
                info!(stage = %self.name, "stop requested");
                break;
            }

            let next = tokio::select! {
                changed = self.running.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.inbox.next() => next,
            };
            let Some(next) = next else {
                info!(stage = %self.name, "venue channel closed");
                break;
            };

            let envelope = match next {
                Ok(envelope) => envelope,
                Err(EventBusError::Lagged { skipped, .. }) => {
                    self.metrics.record_lagged(skipped);
                    continue;
                }
                Err(e) => {
                    warn!(stage = %self.name, error = %e, "receive failed, backing off");
                    self.metrics.record_error(ErrorKind::Transient);
                    tokio::time::sleep(TRANSIENT_BACKOFF).await;
                    continue;
                }
            };

            self.metrics.record_received();
            self.metrics.record_end_to_end(envelope.age_ns(Ts::now()));
            let order = match envelope.message {
                Message::Routed(order) => order,
                other => {
                    debug!(stage = %self.name, kind = other.kind(), "unexpected message dropped");
                    self.metrics.record_error(ErrorKind::DataQuality);
                    continue;
                }
            };

            let started = Instant::now();
            let outputs = self.execute(order).await;
            self.metrics.record_processing(started.elapsed());
            for message in outputs {
                self.outlet.publish(message, &self.metrics);
            }
        }
        info!(stage = %self.name, snapshot = ?self.metrics.snapshot(), "execution stage stopped");
        Ok(())
    }
}
