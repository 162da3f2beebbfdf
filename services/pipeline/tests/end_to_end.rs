//! Whole pipeline: ticks in, acks, fills and rejects out

use anyhow::{Result, bail};
use bus::{Address, Message, Topic};
use common::{ManualClock, Px, RejectReason, Side, Symbol, VenueCode};
use pipeline::{BusSettings, Pipeline, PipelineConfig, replay};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{TickFactory, clock, recv_message, to_json_lines};

/// Ask-heavy quote: imbalance -0.6 makes L1 buy with confidence 0.6
fn ask_heavy_tick() -> Message {
    Message::Tick(TickFactory::new(1).with_sizes(1.0, 4.0).build(1, 100.0, 101.0))
}

#[rstest]
#[case::single_shard(1)]
#[case::sharded(4)]
#[tokio::test]
async fn test_tick_becomes_fill(clock: ManualClock, #[case] shards: u32) -> Result<()> {
    let config = PipelineConfig {
        bus: BusSettings {
            shards,
            ..BusSettings::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::start(&config, Arc::new(clock.clone()))?;
    let bus = Arc::clone(pipeline.bus());
    let mut acks = bus.subscribe(Address::topic(Topic::Acks))?;
    let mut fills = bus.subscribe(Address::topic(Topic::Fills))?;

    bus.publish(ask_heavy_tick(), "test")?;

    let Message::Ack(ack) = recv_message(&mut acks).await? else {
        bail!("expected an ack");
    };
    assert_eq!(ack.venue, VenueCode::Binance);
    let Message::Fill(fill) = recv_message(&mut fills).await? else {
        bail!("expected a fill");
    };
    assert_eq!(fill.client_id, ack.client_id);
    assert_eq!(fill.symbol, Symbol::new(1));
    assert_eq!(fill.side, Side::Bid);
    // Microprice (100 * 4 + 101 * 1) / 5
    assert_eq!(fill.price, Px::new(100.2));

    assert!(pipeline.wait_idle(Duration::from_millis(50), Duration::from_secs(2)).await);
    let decision = pipeline.stage_metrics("decision").map(|m| (m.counter("intents"), m.counter("fills")));
    assert_eq!(decision, Some((1, 1)));

    pipeline.shutdown().await
}

#[rstest]
#[tokio::test]
async fn test_risk_reject_flows_to_rejects(clock: ManualClock) -> Result<()> {
    let mut config = PipelineConfig::default();
    config.risk.max_order_notional = 100.0;
    let pipeline = Pipeline::start(&config, Arc::new(clock.clone()))?;
    let mut rejects = pipeline.bus().subscribe(Address::topic(Topic::Rejects))?;

    pipeline.bus().publish(ask_heavy_tick(), "test")?;

    let Message::Reject(reject) = recv_message(&mut rejects).await? else {
        bail!("expected a reject");
    };
    assert_eq!(reject.reason(), Some(RejectReason::PositionLimit));
    assert_eq!(reject.symbol, Symbol::new(1));

    pipeline.shutdown().await
}

#[rstest]
#[tokio::test]
async fn test_replay_drives_pipeline(clock: ManualClock) -> Result<()> {
    let pipeline = Pipeline::start(&PipelineConfig::default(), Arc::new(clock.clone()))?;
    let mut acks = pipeline.bus().subscribe(Address::topic(Topic::Acks))?;

    let input = to_json_lines(&[ask_heavy_tick()])?;
    let stats = replay(input.as_bytes(), pipeline.bus(), &clock).await?;
    assert_eq!(stats.published, 1);

    assert!(matches!(recv_message(&mut acks).await?, Message::Ack(_)));
    pipeline.shutdown().await
}

#[rstest]
#[tokio::test]
async fn test_zero_shards_refused(clock: ManualClock) {
    let config = PipelineConfig {
        bus: BusSettings {
            shards: 0,
            ..BusSettings::default()
        },
        ..PipelineConfig::default()
    };
    assert!(Pipeline::start(&config, Arc::new(clock)).is_err());
}

#[rstest]
#[tokio::test]
async fn test_replay_from_file(clock: ManualClock) -> Result<()> {
    use std::io::Write as _;

    let mut file = tempfile::NamedTempFile::new()?;
    let ticks = TickFactory::new(2).build_series(&[50.0, 50.5, 51.0], 0.5);
    let messages: Vec<Message> = ticks.iter().cloned().map(Message::Tick).collect();
    file.write_all(to_json_lines(&messages)?.as_bytes())?;
    file.flush()?;

    let pipeline = Pipeline::start(&PipelineConfig::default(), Arc::new(clock.clone()))?;
    let input = tokio::fs::File::open(file.path()).await?;
    let stats = replay(tokio::io::BufReader::new(input), pipeline.bus(), &clock).await?;
    assert_eq!(stats.published, 3);

    assert!(pipeline.wait_idle(Duration::from_millis(50), Duration::from_secs(2)).await);
    let book = pipeline.stage_metrics("book.0").map(|m| m.received());
    assert_eq!(book, Some(3));
    pipeline.shutdown().await
}
