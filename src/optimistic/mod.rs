//! Optimistic Update Module
//!
//! Instant feedback on mutations: a tentative projection now, remote truth
//! once the mutation settles.

mod manager;
mod transaction;

pub use manager::{ManagerConfig, Notice, OptimisticUpdateManager};
pub use transaction::{OptimisticTransaction, TxStatus};
