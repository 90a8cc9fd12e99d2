//! # Tradesync Protocol
//!
//! Shared types for the tradesync data-access core: resource collections,
//! canonical filter sets, subscription keys, change events, and the record
//! shapes exchanged with the remote store.
//!
//! Everything here is plain data. The push path (`tradesync-channel`) and the
//! pull path (`tradesync-fetch`) both speak these types, which is what lets a
//! single subscription key dedup transport channels across call sites.

mod events;
mod filters;
mod records;

pub use events::{ChangeEvent, ChangeKind, RawNotice};
pub use filters::{Collection, FilterSet, SubscriptionKey};
pub use records::{ApiEnvelope, PriceRecord, ShipmentRecord, SupplierRecord};
