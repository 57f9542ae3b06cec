//! Encrypted media storage and throttled delivery.
//!
//! Media lives encrypted at rest in the [`MediaVault`] under opaque
//! names. Delivery decrypts in memory and streams paced chunks; the
//! [`LoadCounter`] is advisory and only selects the delivery mode, it
//! never refuses a stream.

mod error;
mod load;
mod stream;
mod throttle;
mod vault;

pub use error::{DeliveryError, DeliveryResult};
pub use load::{LoadCounter, DEFAULT_LOAD_WINDOW};
pub use stream::stream_chunks;
pub use throttle::{DeliveryConfig, DeliveryMode, Pacer, HARD_CAP_BACKOFF};
pub use vault::{preview_slice, MediaVault, StoredMedia, PREVIEW_BYTES_PER_SECOND};
