//! Level-shifting merge of an authoritative point into a simulated history.
//!
//! Appending a real quote after a simulated tail would leave a visible jump
//! (a 2350 baseline followed by a 2600 print). The reconciler shifts every
//! stored price by the gap between the tail and the authoritative quote,
//! so the history keeps its shape and joins the new point continuously.
//!
//! Order of operations: rewrite, evict the oldest point, append. The window
//! length is unchanged.

use crate::store::SeriesStore;
use crate::types::{round_to, DataPoint};
use crate::Result;
use tracing::{debug, info};

/// What a reconciliation did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOutcome {
    /// Amount added to every stored primary and derived price
    pub offset: f64,
    /// Points rewritten before eviction
    pub rewritten: usize,
    /// Window length after the merge
    pub len: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryReconciler {
    price_decimals: u32,
}

impl HistoryReconciler {
    pub fn new(price_decimals: u32) -> Self {
        Self { price_decimals }
    }

    /// Merge `authoritative` into `store`, shifting history to meet it.
    ///
    /// Applying this twice for the same point shifts twice; callers run it
    /// once per incoming authoritative point.
    pub fn reconcile(
        &self,
        store: &mut SeriesStore,
        mut authoritative: DataPoint,
    ) -> Result<ReconcileOutcome> {
        let Some(latest) = store.latest() else {
            store.append(authoritative);
            return Ok(ReconcileOutcome {
                offset: 0.0,
                rewritten: 0,
                len: store.len(),
            });
        };

        let offset = authoritative.primary_price - latest.primary_price;
        let incoming = authoritative.timestamp;
        if authoritative.stamp_after(latest.timestamp) {
            debug!(
                incoming,
                tail = latest.timestamp,
                "Authoritative point not after tail, restamping"
            );
        }

        let shifted: Vec<DataPoint> = store
            .points()
            .iter()
            .map(|p| DataPoint {
                primary_price: round_to(p.primary_price + offset, self.price_decimals),
                derived_price: round_to(p.derived_price + offset, self.price_decimals),
                ..p.clone()
            })
            .collect();
        let rewritten = shifted.len();

        store.replace_all(shifted)?;
        store.evict_oldest();
        store.append(authoritative);

        info!(
            offset = round_to(offset, self.price_decimals),
            rewritten,
            len = store.len(),
            "Reconciled history to authoritative price"
        );

        Ok(ReconcileOutcome {
            offset,
            rewritten,
            len: store.len(),
        })
    }
}

impl Default for HistoryReconciler {
    fn default() -> Self {
        Self::new(2)
    }
}
