//! Bulk stub registration for mock-server load tests.
//!
//! A [`StubLoader`] populates a mock HTTP server, either one embedded in
//! this process or a remote WireMock-compatible instance, with the rules of
//! a [`Scenario`]. The external load driver then exercises the populated
//! server using the [`LoadPlan`] the loader hands out.

pub mod config;
pub mod error;
pub mod loader;
pub mod matching;
pub mod pool;
pub mod scenario;
pub mod stub;
pub mod target;
pub mod telemetry;
pub mod template;

pub use config::LoadTestConfig;
pub use error::{LoaderError, Result};
pub use loader::{LoadPlan, StubLoader};
pub use pool::{PoolReport, WorkerPool};
pub use scenario::Scenario;
