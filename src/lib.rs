#![allow(clippy::too_many_arguments)]

pub mod browser;
pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod notify;
pub mod parsers;
pub mod results;
pub mod snapshot;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use browser::{ActionOutcome, BrowserSession, PageDriver, SessionFactory, WebDriverFactory};
pub use capabilities::{DecisionCapability, MatchScore, MatchScorer};
pub use config::ScanConfig;
pub use engine::ScanOrchestrator;
pub use filter::DedupFilter;
pub use model::{
    Company, KnownListingIndex, ListingRecord, NavigationAction, NavigationGoal, UserProfile,
};
pub use results::{BatchReport, CompanyReport, ScanAttempt, ScanStatus, ScannedListing};
pub use snapshot::{ElementRef, PageSnapshot};
