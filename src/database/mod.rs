// Database module
// LanceDB holds every indexed chunk together with its embedding

pub mod lancedb;

pub use lancedb::{CodeRecord, CodeStore, StoredMatch};
