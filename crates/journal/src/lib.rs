mod error;
mod journal;
mod model;
mod sink;

pub use error::JournalError;
pub use journal::{HistoryJournal, BATCH_SIZE, QUEUE_CAPACITY};
pub use model::{
    cap_json, to_capped_json, HistoryEntry, HistoryFilter, HistoryPage, SortField,
    CONNECTION_ID_MAX, ERROR_MAX, JSON_MAX_BYTES, NOTES_MAX, TARGET_MAX, TOOL_TYPE_MAX,
};
pub use sink::{HistorySink, InMemorySink};
