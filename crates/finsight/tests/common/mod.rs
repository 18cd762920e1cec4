//! Shared test utilities for finsight integration tests.
//!
//! - `TestHarness`: temp data/outputs directories, in-memory store and
//!   queue, a `JobManager` and its router
//! - `analyzers`: scripted `DocumentAnalyzer` and `ChatModel` stand-ins
//! - `builders`: PDF bytes and multipart request bodies

pub mod analyzers;
pub mod builders;
pub mod harness;

pub use analyzers::*;
pub use builders::*;
pub use harness::TestHarness;
