//! Progress ledger: the persisted record of completed units that drives
//! resume.

mod persistence;
mod types;

pub use persistence::{ProgressLedger, LEDGER_FILE_NAME};
pub use types::{ProgressRecord, UnitKey};
