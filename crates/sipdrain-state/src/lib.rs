//! sipdrain-state — drain-record store for sipdrain.
//!
//! Backed by [redb](https://docs.rs/redb). Holds one [`TaskDrainRecord`]
//! per orchestrated task plus a secondary `(serviceArn, state, startedAt)`
//! index used by the admission gates.
//!
//! # Operations
//!
//! - [`StateStore::get`] — point read by task ARN
//! - [`StateStore::conditional_put`] — atomic compare-and-set on one record;
//!   the only mutual-exclusion primitive in the system
//! - [`StateStore::update`] — unconditional field merge
//! - [`StateStore::query_service`] — index range scan
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
