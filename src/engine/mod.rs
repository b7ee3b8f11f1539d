//! The discovery engine: decisions, navigation, pagination, description
//! fetching, and the per-company orchestration that ties them together.

mod descriptions;
mod navigation;
mod orchestrator;
mod pagination;
mod resolver;

pub use descriptions::{DescriptionFetcher, FetchedDescription};
pub use navigation::{AbortReason, NavState, NavigationOutcome, NavigationReport, Navigator};
pub use orchestrator::ScanOrchestrator;
pub use pagination::{PaginationReport, Paginator};
pub use resolver::{ActionResolver, validate};
