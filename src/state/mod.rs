pub mod event_store;

pub use event_store::{RawTable, Snapshot};
