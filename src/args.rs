use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "careerscan")]
#[command(about = "Scans company career sites for job listings matching a profile")]
#[command(version)]
pub struct Args {
    /// JSON file with the companies to scan
    #[arg(long)]
    pub companies: PathBuf,

    /// JSON file with the candidate profile
    #[arg(long)]
    pub profile: PathBuf,

    /// JSON scan configuration (defaults are used when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON file holding known listings and results between runs
    #[arg(long, default_value = "careerscan-state.json")]
    pub state: PathBuf,

    /// Number of companies scanned at the same time
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Maximum result pages per company
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum navigation actions per company
    #[arg(long)]
    pub action_budget: Option<usize>,

    /// Search keywords (overrides the profile preferences)
    #[arg(short, long, value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Location filter
    #[arg(short, long)]
    pub location: Option<String>,

    /// Prefer remote positions
    #[arg(long)]
    pub remote: bool,
}

impl Args {
    /// True when any goal flag was given
    pub fn has_goal(&self) -> bool {
        !self.keywords.is_empty() || self.location.is_some() || self.remote
    }
}
