//! Optimistic Transaction
//!
//! Lifecycle record of one tentative write: pending until the mutation
//! settles, then confirmed or rolled back and discarded.

use serde::Serialize;

use crate::projection::{EntityId, Projected, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct OptimisticTransaction {
    pub entity_id: EntityId,
    pub tentative: Record,
    /// Projection replaced by the tentative write, restored if refetch fails
    pub previous: Option<Projected>,
    status: TxStatus,
}

impl OptimisticTransaction {
    pub fn begin(entity_id: EntityId, tentative: Record, previous: Option<Projected>) -> Self {
        Self {
            entity_id,
            tentative,
            previous,
            status: TxStatus::Pending,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Pending → Confirmed. Returns false if already terminal.
    pub fn confirm(&mut self) -> bool {
        self.finish(TxStatus::Confirmed)
    }

    /// Pending → RolledBack. Returns false if already terminal.
    pub fn roll_back(&mut self) -> bool {
        self.finish(TxStatus::RolledBack)
    }

    fn finish(&mut self, status: TxStatus) -> bool {
        if self.status != TxStatus::Pending {
            return false;
        }
        self.status = status;
        true
    }
}
