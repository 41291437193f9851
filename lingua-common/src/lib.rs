//! Common types and utilities shared across Lingua crates.
//!
//! This crate defines the error taxonomy, element locators, the extracted
//! record type, and observability helpers used throughout the Lingua
//! workspace. It is intentionally lightweight so that every crate can depend
//! on it without introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`HarvestError`] and [`Result`]: shared error handling
//! - [`Locator`]: how an element is addressed in the live page
//! - [`TeacherRecord`]: one extracted listing item
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use lingua_common::{HarvestError, Locator};
//!
//! let menu = Locator::css("ul.ant-menu");
//! assert_eq!(menu.to_string(), "css:ul.ant-menu");
//!
//! let err = HarvestError::Stale("li[3]".into());
//! assert!(err.is_stale() && err.is_retryable());
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;
mod record;

pub use record::TeacherRecord;

/// How an element is addressed in the live page.
///
/// Serialized externally tagged so configuration reads naturally:
/// `{ css: "a.ant-btn" }` or `{ xpath: "//*[@id='lessons']" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Self::XPath(path.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Error types used across the Lingua system.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    /// A previously located element no longer matches the live view.
    #[error("Stale element reference: {0}")]
    Stale(String),

    /// The driver reported a failure that a reload is expected to clear.
    #[error("Transient driver error: {0}")]
    Transient(String),

    /// An expected element never appeared.
    #[error("Element not found: {0}")]
    NotFound(String),

    /// The source signalled that no further pages exist.
    #[error("No further pages")]
    EndOfPages,

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The record store rejected a write.
    #[error("Store error: {0}")]
    Store(String),

    /// The session is unusable; the run must stop.
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl HarvestError {
    pub fn is_stale(&self) -> bool {
        matches!(self, HarvestError::Stale(_))
    }

    /// Errors a page reload is expected to resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::Stale(_) | HarvestError::Transient(_) | HarvestError::NotFound(_)
        )
    }

    /// Errors that must end the run instead of skipping the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::Fatal(_) | HarvestError::Store(_) | HarvestError::Config(_)
        )
    }
}

/// Convenient alias for results that use [`HarvestError`].
pub type Result<T> = std::result::Result<T, HarvestError>;
