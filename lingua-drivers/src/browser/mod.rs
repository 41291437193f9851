//! WebDriver-backed implementation of [`PageDriver`](crate::PageDriver).
pub mod errors;
pub mod session;
