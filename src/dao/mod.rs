/// Draft, pending-question, and story persistence.
pub mod draft_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
