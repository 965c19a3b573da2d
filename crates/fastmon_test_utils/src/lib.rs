//! Fast Monitoring Test Utilities
//!
//! In-memory stand-ins for the catalog and the broker, a log capture for
//! asserting on emitted errors, and STF file fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fastmon_test_utils::{MockCatalog, RecordingBroker, TestEnv};
//!
//! #[tokio::test]
//! async fn test_pipeline() {
//!     let env = TestEnv::new();
//!     let catalog = MockCatalog::new();
//!     let broker = RecordingBroker::new();
//!     let mut agent = env.agent(&catalog, &broker);
//!     // ...
//! }
//! ```

pub mod broker;
pub mod catalog;
pub mod fixtures;
pub mod logs;

pub use broker::RecordingBroker;
pub use catalog::{CatalogCall, MockCatalog};
pub use fixtures::{stf_ready, write_stf, TestEnv};
pub use logs::{capture_logs, LogCapture};
