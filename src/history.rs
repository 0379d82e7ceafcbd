use crate::store::{AnalysisRecord, RecordStore};
use crate::Error;

/// How many records the history listing returns.
pub const HISTORY_LIMIT: u32 = 10;

/// The most recent records, newest first.
pub async fn recent_history(store: &RecordStore) -> Result<Vec<AnalysisRecord>, Error> {
    store.recent(HISTORY_LIMIT).await
}
