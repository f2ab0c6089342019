//! # Stub targets
//!
//! A target is the mock server stubs are registered against: either an
//! in-process `wiremock` server owned by the loader, or a remote server
//! driven through its admin API.

mod embedded;
mod journal;
mod remote;

use async_trait::async_trait;

use crate::error::Result;
use crate::stub::{DelayDistribution, StubRule};

pub use embedded::{EmbeddedOptions, EmbeddedTarget};
pub use journal::{JournalEntry, RequestJournal};
pub use remote::RemoteTarget;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StubTarget: Send + Sync {
    /// Store one rule on the server
    async fn register(&self, rule: &StubRule) -> Result<()>;

    /// Drop every registered rule, back to the server's baseline mappings
    async fn reset(&self) -> Result<()>;

    /// Delay every response by a value drawn from `delay`
    async fn set_global_random_delay(&self, delay: DelayDistribution) -> Result<()>;

    /// `scheme://host:port/`
    fn base_url(&self) -> String;

    /// Release the server if this target owns it; safe to call repeatedly
    async fn stop(&self) -> Result<()>;
}
