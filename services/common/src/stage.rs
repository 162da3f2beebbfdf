//! Reactive stage loop
//!
//! Each stage runs as one tokio task: receive from its input addresses, hand
//! the message to a synchronous handler, publish whatever the handler put in
//! the outbox. The loop suspends only on receive, publish and the run flag.

use crate::constants::{OUTBOX_INLINE, TRANSIENT_BACKOFF};
use crate::errors::{ErrorKind, StageError};
use crate::metrics::StageMetrics;
use bus::{Address, EventBus, EventBusError, Message, MessageEnvelope};
use common::Ts;
use futures::StreamExt;
use futures::stream::{BoxStream, SelectAll};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Messages produced by one handler call
pub type Outbox = SmallVec<[Message; OUTBOX_INLINE]>;

/// Shared "running" flag observed between messages
pub type RunFlag = watch::Receiver<bool>;

/// Create the running flag; send `false` to stop every stage holding a receiver
#[must_use]
pub fn run_flag() -> (watch::Sender<bool>, RunFlag) {
    watch::channel(true)
}

/// Per-call handler context
pub struct Context<'a> {
    /// Output buffer, published after the handler returns
    pub outbox: &'a mut Outbox,
    /// Stage metrics for stage-specific counters
    pub metrics: &'a StageMetrics,
}

impl Context<'_> {
    /// Queue a message for publishing
    #[inline]
    pub fn emit(&mut self, message: Message) {
        self.outbox.push(message);
    }
}

/// A synchronous per-message handler with exclusively owned state
pub trait Stage: Send + 'static {
    /// Stage label used in logs, metrics and envelope metadata
    fn name(&self) -> &str;

    /// Handle one inbound message
    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError>;

    /// Called once after the loop exits
    fn on_stop(&mut self, _metrics: &StageMetrics) {}
}

/// Merged receive side over several addresses
pub struct Inbox {
    addresses: Vec<Address>,
    streams: SelectAll<BoxStream<'static, Result<MessageEnvelope<Message>, EventBusError>>>,
}

impl Inbox {
    /// Subscribe to every address in `addresses`
    pub fn subscribe(bus: &EventBus<Message>, addresses: &[Address]) -> Result<Self, EventBusError> {
        let mut streams = SelectAll::new();
        for &address in addresses {
            streams.push(bus.subscribe(address)?.into_stream().boxed());
        }
        Ok(Self {
            addresses: addresses.to_vec(),
            streams,
        })
    }

    /// Subscribed addresses
    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Next envelope from any input; `None` once every input has closed
    pub async fn next(&mut self) -> Option<Result<MessageEnvelope<Message>, EventBusError>> {
        self.streams.next().await
    }
}

/// Publishing side bound to one stage
pub struct Outlet {
    bus: Arc<EventBus<Message>>,
    source: String,
}

impl Outlet {
    /// Publisher stamping envelopes with `source`
    pub fn new(bus: Arc<EventBus<Message>>, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    /// Publish one message; delivery failures are counted, never returned
    pub fn publish(&self, message: Message, metrics: &StageMetrics) {
        let kind = message.kind();
        match self.bus.publish(message, &self.source) {
            Ok(_) => metrics.record_emitted(),
            Err(EventBusError::NoSubscribers { address }) => {
                debug!(stage = %self.source, %address, kind, "output has no subscribers");
                metrics.record_unrouted();
            }
            Err(e) => {
                debug!(stage = %self.source, kind, error = %e, "publish failed");
                metrics.record_unrouted();
            }
        }
    }
}

/// Drives one [`Stage`] until the run flag drops or all inputs close
pub struct StageRunner<S: Stage> {
    stage: S,
    inbox: Inbox,
    outlet: Outlet,
    metrics: Arc<StageMetrics>,
    running: RunFlag,
    backoff: Duration,
}

impl<S: Stage> StageRunner<S> {
    /// Subscribe `stage` to `inputs` on `bus`
    pub fn new(
        stage: S,
        bus: Arc<EventBus<Message>>,
        inputs: &[Address],
        running: RunFlag,
    ) -> Result<Self, EventBusError> {
        let inbox = Inbox::subscribe(&bus, inputs)?;
        let metrics = Arc::new(StageMetrics::new(stage.name()));
        let outlet = Outlet::new(bus, stage.name());
        Ok(Self {
            stage,
            inbox,
            outlet,
            metrics,
            running,
            backoff: TRANSIENT_BACKOFF,
        })
    }

    /// Override the transient-failure backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Metrics handle that stays valid after the runner is moved into a task
    #[must_use]
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the loop; returns the stage so its final state can be inspected
    pub async fn run(mut self) -> Result<S, StageError> {
        let name = self.stage.name().to_string();
        info!(stage = %name, inputs = ?self.inbox.addresses(), "stage started");

        let mut outbox = Outbox::new();
        let result = loop {
            if !*self.running.borrow() {
                info!(stage = %name, "stop requested");
                break Ok(());
            }

            let next = tokio::select! {
                changed = self.running.changed() => {
                    if changed.is_err() {
                        info!(stage = %name, "run flag dropped");
                        break Ok(());
                    }
                    continue;
                }
                next = self.inbox.next() => next,
            };

            let Some(next) = next else {
                info!(stage = %name, "all inputs closed");
                break Ok(());
            };

            let envelope = match next {
                Ok(envelope) => envelope,
                Err(EventBusError::Lagged { skipped, .. }) => {
                    self.metrics.record_lagged(skipped);
                    continue;
                }
                Err(e) => {
                    warn!(stage = %name, error = %e, "receive failed, backing off");
                    self.metrics.record_error(ErrorKind::Transient);
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            if let Err(e) = self.dispatch(envelope, &mut outbox).await {
                break Err(e);
            }
        };

        self.stage.on_stop(&self.metrics);
        info!(stage = %name, snapshot = ?self.metrics.snapshot(), "stage stopped");
        result.map(|()| self.stage)
    }

    async fn dispatch(
        &mut self,
        envelope: MessageEnvelope<Message>,
        outbox: &mut Outbox,
    ) -> Result<(), StageError> {
        self.metrics.record_received();
        self.metrics.record_end_to_end(envelope.age_ns(Ts::now()));

        let correlation_id = envelope.metadata.correlation_id;
        let kind = envelope.message.kind();
        let started = Instant::now();
        let result = {
            let mut ctx = Context {
                outbox: &mut *outbox,
                metrics: &self.metrics,
            };
            self.stage.handle(envelope.message, &mut ctx)
        };
        self.metrics.record_processing(started.elapsed());

        for message in outbox.drain(..) {
            self.outlet.publish(message, &self.metrics);
        }

        let Err(e) = result else {
            return Ok(());
        };
        self.metrics.record_error(e.kind());
        match e.kind() {
            ErrorKind::DataQuality => {
                debug!(stage = self.stage.name(), kind, correlation_id = ?correlation_id, error = %e, "message dropped");
                Ok(())
            }
            ErrorKind::Transient => {
                warn!(stage = self.stage.name(), kind, correlation_id = ?correlation_id, error = %e, "transient failure, backing off");
                tokio::time::sleep(self.backoff).await;
                Ok(())
            }
            ErrorKind::Fatal => {
                error!(stage = self.stage.name(), kind, correlation_id = ?correlation_id, error = %e, "fatal stage error");
                Err(e)
            }
        }
    }
}

/// Spawn `runner` on the current runtime
pub fn spawn_stage<S: Stage>(runner: StageRunner<S>) -> JoinHandle<Result<S, StageError>> {
    tokio::spawn(runner.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::{EventBusConfig, Topic};
    use common::{Px, Qty, Symbol, TickUpdate, TopOfBook};

    /// Echoes ticks as top-of-book; sequence 0 is invalid, 99 is fatal
    struct Echo;

    impl Stage for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
            let tick = match message {
                Message::Tick(tick) => tick,
                other => {
                    return Err(StageError::UnexpectedMessage { stage: "echo", kind: other.kind() });
                }
            };
            match tick.sequence {
                0 => return Err(StageError::invalid("tick", "zero sequence")),
                99 => return Err(StageError::Fatal("boom".into())),
                _ => {}
            }
            ctx.metrics.incr("echoed");
            ctx.emit(Message::TopOfBook(TopOfBook {
                ts: tick.ts,
                symbol: tick.symbol,
                bid_price: tick.bid_price,
                bid_size: tick.bid_size,
                ask_price: tick.ask_price,
                ask_size: tick.ask_size,
            }));
            Ok(())
        }
    }

    fn tick(sequence: u64) -> Message {
        Message::Tick(TickUpdate {
            ts: Ts::from_nanos(sequence),
            symbol: Symbol::new(1),
            bid_price: Px::new(100.0),
            bid_size: Qty::new(1.0),
            ask_price: Px::new(101.0),
            ask_size: Qty::new(1.0),
            sequence,
        })
    }

    fn bus() -> Arc<EventBus<Message>> {
        Arc::new(EventBus::new(EventBusConfig { capacity: 64, shards: 1 }))
    }

    #[tokio::test]
    async fn test_runner_forwards_and_drops() -> Result<(), Box<dyn std::error::Error>> {
        let bus = bus();
        let (stop, running) = run_flag();
        let runner = StageRunner::new(Echo, Arc::clone(&bus), &[Address::shard(Topic::Ticks, 0)], running)?;
        let metrics = runner.metrics();
        let mut out = bus.subscribe(Address::shard(Topic::Book, 0))?;
        let handle = spawn_stage(runner);

        bus.publish(tick(1), "test")?;
        bus.publish(tick(0), "test")?;
        bus.publish(tick(2), "test")?;

        let first = out.recv().await?;
        let second = out.recv().await?;
        assert!(matches!(first.message, Message::TopOfBook(t) if t.ts == Ts::from_nanos(1)));
        assert!(matches!(second.message, Message::TopOfBook(t) if t.ts == Ts::from_nanos(2)));
        assert_eq!(first.metadata.source, "echo");

        stop.send(false)?;
        handle.await??;
        assert_eq!(metrics.received(), 3);
        assert_eq!(metrics.emitted(), 2);
        assert_eq!(metrics.dropped(), 1);
        assert_eq!(metrics.counter("echoed"), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_fatal_error_stops_stage() -> Result<(), Box<dyn std::error::Error>> {
        let bus = bus();
        let (_stop, running) = run_flag();
        let runner = StageRunner::new(Echo, Arc::clone(&bus), &[Address::shard(Topic::Ticks, 0)], running)?;
        let handle = spawn_stage(runner);

        bus.publish(tick(99), "test")?;
        let result = handle.await?;
        assert!(matches!(result, Err(StageError::Fatal(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_inputs_end_stage() -> Result<(), Box<dyn std::error::Error>> {
        let bus = bus();
        let (_stop, running) = run_flag();
        let runner = StageRunner::new(Echo, Arc::clone(&bus), &[Address::shard(Topic::Ticks, 0)], running)?;
        let handle = spawn_stage(runner);

        bus.shutdown();
        assert!(handle.await?.is_ok());
        Ok(())
    }
}
