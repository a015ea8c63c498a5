pub mod gc;
pub mod sqlite;
pub mod store;

pub use gc::spawn_garbage_collector;
pub use sqlite::SqliteNonceLedger;
pub use store::{ClaimOutcome, LedgerError, NonceLedger};
