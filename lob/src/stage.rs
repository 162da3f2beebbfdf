//! Sharded book stage: ticks in, deltas and top-of-book out

use crate::book::{BookError, OrderBook};
use bus::Message;
use common::{BookDelta, Symbol, TickUpdate};
use rustc_hash::FxHashMap;
use services_common::{Context, Stage, StageError, StageMetrics};
use tracing::{debug, info, warn};

/// Owns every book whose symbol hashes to `shard`
pub struct BookStage {
    name: String,
    shard: u32,
    shards: u32,
    books: FxHashMap<Symbol, OrderBook>,
}

impl BookStage {
    /// Stage for one shard out of `shards`
    #[must_use]
    pub fn new(shard: u32, shards: u32) -> Self {
        Self {
            name: format!("book.{shard}"),
            shard,
            shards: shards.max(1),
            books: FxHashMap::default(),
        }
    }

    /// Shard index
    #[must_use]
    pub const fn shard(&self) -> u32 {
        self.shard
    }

    /// Book for `symbol`, if any tick has been seen
    #[must_use]
    pub fn book(&self, symbol: Symbol) -> Option<&OrderBook> {
        self.books.get(&symbol)
    }

    /// Symbols with a sequence gap awaiting recovery
    pub fn recovery_pending(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.books
            .values()
            .filter(|b| b.recovery_pending())
            .map(|b| b.symbol)
    }

    /// Recent ticks for `symbol`, oldest first
    #[must_use]
    pub fn recent_updates(&self, symbol: Symbol) -> Vec<TickUpdate> {
        self.books
            .get(&symbol)
            .map(|b| b.recent_updates().cloned().collect())
            .unwrap_or_default()
    }

    /// Mark `symbol` as recovered
    pub fn clear_recovery(&mut self, symbol: Symbol) {
        if let Some(book) = self.books.get_mut(&symbol) {
            book.clear_recovery();
        }
    }

    fn owns(&self, symbol: Symbol) -> Result<(), StageError> {
        if symbol.shard(self.shards) == self.shard {
            Ok(())
        } else {
            Err(StageError::WrongShard {
                symbol: symbol.0,
                shard: self.shard,
            })
        }
    }

    fn reject(metrics: &StageMetrics, what: &'static str, error: &BookError) -> StageError {
        metrics.incr(match error {
            BookError::StaleSequence { .. } => "stale_ticks",
            BookError::CrossedBook { .. } => "crossed_updates",
            BookError::InvalidPrice { .. } | BookError::NegativeSize { .. } => "invalid_updates",
        });
        StageError::invalid(what, error.to_string())
    }

    fn on_tick(&mut self, tick: &TickUpdate, ctx: &mut Context<'_>) -> Result<(), StageError> {
        self.owns(tick.symbol)?;
        let book = self
            .books
            .entry(tick.symbol)
            .or_insert_with(|| OrderBook::new(tick.symbol));

        let outcome = book
            .apply_tick(tick)
            .map_err(|e| Self::reject(ctx.metrics, "tick", &e))?;

        if let Some(gap) = outcome.gap {
            warn!(
                symbol = %tick.symbol,
                expected = gap.expected,
                received = gap.received,
                missing = gap.missing(),
                "sequence gap, symbol flagged for recovery"
            );
            ctx.metrics.incr("sequence_gaps");
        }

        for delta in outcome.deltas {
            ctx.emit(Message::BookDelta(delta));
        }
        match outcome.top {
            Some(top) => ctx.emit(Message::TopOfBook(top)),
            None => ctx.metrics.incr("one_sided"),
        }
        Ok(())
    }

    fn on_delta(&mut self, delta: &BookDelta, ctx: &mut Context<'_>) -> Result<(), StageError> {
        self.owns(delta.symbol)?;
        let book = self
            .books
            .entry(delta.symbol)
            .or_insert_with(|| OrderBook::new(delta.symbol));

        let changed = book
            .apply_delta(delta)
            .map_err(|e| Self::reject(ctx.metrics, "book delta", &e))?;
        if !changed {
            debug!(symbol = %delta.symbol, side = %delta.side, price = %delta.price, "delta left book unchanged");
            return Ok(());
        }

        ctx.emit(Message::BookDelta(*delta));
        if let Some(top) = book.top_of_book() {
            ctx.emit(Message::TopOfBook(top));
        }
        Ok(())
    }
}

impl Stage for BookStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<(), StageError> {
        match message {
            Message::Tick(tick) => self.on_tick(&tick, ctx),
            Message::BookDelta(delta) => self.on_delta(&delta, ctx),
            other => Err(StageError::UnexpectedMessage {
                stage: "book",
                kind: other.kind(),
            }),
        }
    }

    fn on_stop(&mut self, metrics: &StageMetrics) {
        let pending: Vec<Symbol> = self.recovery_pending().collect();
        info!(
            stage = %self.name,
            books = self.books.len(),
            gaps = metrics.counter("sequence_gaps"),
            recovery_pending = ?pending,
            "book stage stopped"
        );
    }
}
