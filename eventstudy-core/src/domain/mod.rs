//! Domain types for the event study pipeline.

pub mod event;
pub mod price;
pub mod recommendation;

pub use event::{EventRecord, EventType};
pub use price::{FactorRecord, PriceRecord, ReturnRecord};
pub use recommendation::RecommendationRecord;
