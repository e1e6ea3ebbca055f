//! Archive of finished interviews in a hosted table store.
//!
//! One row per committed quote, written over the store's REST API. Saving is
//! best effort: an unconfigured store skips, a failing store reports an error
//! to the caller, and neither outcome touches the interview itself.

pub mod client;
pub mod payload;

pub use client::RecordStoreRecorder;
pub use payload::{RecordRow, NEW_RECORD_STATUS};
