//! Turning page HTML into snapshots, listing records and clean text.

pub mod html;
pub mod listings;
pub mod text;

#[cfg(test)]
mod tests;

pub use html::snapshot;
pub use listings::{ListingExtractor, advance_action, find_advance_control};
