//! Event dispatch.
//!
//! The router owns the ledger and snapshot engine and is the single entry
//! point for decoded events: it enforces stream order, applies the event,
//! and runs the snapshot check after events of a configured trigger kind.

use log::debug;

use crate::{
    events::{EventKind, PoolEvent},
    ledger::Ledger,
    snapshot::SnapshotEngine,
    store::{EntityStore, StoreError},
};

/// Applies events in stream order and triggers snapshot passes.
pub struct EventRouter<S> {
    ledger: Ledger<S>,
    engine: SnapshotEngine,
    trigger_kinds: Vec<EventKind>,
    /// Stream position of the last applied event. Events at or behind it
    /// are replays.
    last_applied: Option<(u64, u32)>,
}

impl<S: EntityStore> EventRouter<S> {
    pub fn new(ledger: Ledger<S>, engine: SnapshotEngine, trigger_kinds: Vec<EventKind>) -> Self {
        Self {
            ledger,
            engine,
            trigger_kinds,
            last_applied: None,
        }
    }

    /// Apply one event, then run the snapshot check when its kind is a
    /// configured trigger.
    ///
    /// Re-delivered events are dropped here, so a reconnecting feed can
    /// replay a block range without double-applying anything.
    pub async fn dispatch(&mut self, event: PoolEvent) -> Result<(), StoreError> {
        let position = event.meta().position();
        if let Some(last_applied) = self.last_applied {
            if position <= last_applied {
                debug!(
                    "Dropping replayed event at block {} log {}",
                    position.0, position.1
                );
                return Ok(());
            }
        }

        let kind = event.kind();
        let block_timestamp = event.meta().block_timestamp;

        self.ledger.apply(&event).await?;
        self.last_applied = Some(position);

        if self.trigger_kinds.contains(&kind) {
            self.engine
                .maybe_snapshot(self.ledger.store_mut(), block_timestamp)
                .await?;
        }
        Ok(())
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        self.ledger.store()
    }
}
