//! Shared test utilities for docsum integration tests.
//!
//! - `TestHarness`: an on-disk database, queue and upload directory in a temp dir
//! - `FakeTransport`: a scripted stand-in for the OpenAI-compatible endpoint
//! - `FlakyStore`: a job store whose saves fail transiently a set number of times

pub mod flaky_store;
pub mod harness;
pub mod transport;

pub use flaky_store::FlakyStore;
pub use harness::TestHarness;
pub use transport::FakeTransport;
