pub mod credentials;
pub mod entities;
pub mod interfaces;
pub mod normalize;
pub mod sqlite;

pub use interfaces::{RecordError, TradeStore, UserStore};
pub use normalize::{parse_memos, parse_timestamp};
pub use sqlite::SqliteJournalStore;
