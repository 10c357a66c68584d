//! Browser tool surface
//!
//! This crate holds everything that touches a browser page:
//! - the closed [`ToolCall`] set and its typed outputs
//! - the [`BrowserSession`] seam plus the [`SessionScope`] that owns one per run
//! - the [`dispatch`] table shared by live execution and replay
//! - page snapshots and the selector expression language
//! - an offline fixture browser used by the CLI and tests

mod dispatch;
pub mod errors;
pub mod fixture;
pub mod query;
pub mod session;
pub mod snapshot;
pub mod types;

pub use dispatch::dispatch;
pub use errors::*;
pub use fixture::{CallRecord, FixtureBrowser, FixturePage, FixtureSession, SiteFixture};
pub use query::{quote_value, SelectorQuery};
pub use session::{BrowserSession, SessionFactory, SessionScope};
pub use snapshot::{PageSnapshot, SnapshotNode};
pub use types::*;
