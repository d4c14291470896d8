pub mod claim;
pub mod expiry;
pub mod matching;
pub mod queue;
pub mod search;
