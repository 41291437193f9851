//! Traversal and extraction engine for the teacher listing.
//!
//! The engine walks a two-level language filter (category, then
//! sub-category), pages through each selection with the "load more"
//! control, opens a window of the loaded items in throwaway tabs, extracts
//! one [`TeacherRecord`](lingua_common::TeacherRecord) per item and writes
//! the records to a [`RecordStore`](lingua_store::RecordStore).
//!
//! # Overview
//!
//! - [`Harvester`]: run controller owning the driver, store and buffer
//! - [`filters`]: filter walk addressed by [`FilterPath`]
//! - [`paginate`]: load-more cursor, ending in a [`PageWalk`]
//! - [`tabs`]: per-item tab open / extract / teardown
//! - [`extract`]: [`DetailExtractor`] over rendered profile markup
//! - [`markup`]: query helpers over parsed HTML
//! - [`retry`]: bounded reload-and-retry guard
//! - [`buffer`]: pending records between flushes
//!
//! # Examples
//!
//! ```rust
//! use lingua_config::TabConfig;
//! use lingua_harvest::tabs::batch_window;
//!
//! // 10 visible items: the third- and second-from-last are opened.
//! assert_eq!(batch_window(10, &TabConfig::default()), 6..8);
//! ```
pub mod buffer;
pub mod extract;
pub mod filters;
pub mod markup;
pub mod paginate;
pub mod retry;
pub mod run;
pub mod tabs;

pub use buffer::RecordBuffer;
pub use extract::DetailExtractor;
pub use filters::FilterPath;
pub use paginate::PageWalk;
pub use retry::RetryPolicy;
pub use run::{Harvester, RunReport};
pub use tabs::BatchOutcome;
