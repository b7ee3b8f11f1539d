use careerscan::capabilities::openrouter::OpenRouterClient;
use careerscan::notify::LogNotifier;
use careerscan::store::JsonFileStore;
use careerscan::{
    Company, NavigationGoal, ScanConfig, ScanOrchestrator, UserProfile, WebDriverFactory,
};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(concurrency) = args.concurrency {
        config.company_concurrency = concurrency;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(budget) = args.action_budget {
        config.action_budget = budget;
    }

    let companies: Vec<Company> = read_json(&args.companies)?;
    let profile: UserProfile = read_json(&args.profile)?;

    println!("Note: scanning requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using the default {}",
        config.webdriver_url
    );

    let llm = Arc::new(OpenRouterClient::from_config(&config.llm)?);
    let factory = Arc::new(WebDriverFactory::new(
        &config.webdriver_url,
        config.settle_delay(),
    ));
    let store = Arc::new(JsonFileStore::new(&args.state));

    let mut orchestrator = ScanOrchestrator::new(
        config,
        factory,
        llm.clone(),
        llm,
        store,
        Arc::new(LogNotifier),
    )?;
    if args.has_goal() {
        orchestrator = orchestrator.with_goal(NavigationGoal {
            keywords: args.keywords.clone(),
            location: args.location.clone(),
            remote: args.remote,
        });
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, finishing the companies in progress");
            on_signal.cancel();
        }
    });

    let start_time = std::time::Instant::now();
    let report = orchestrator.run_batch(&companies, &profile, &cancel).await;
    ::log::info!(
        "Scan complete - {} companies in {:.2} seconds",
        report.companies.len(),
        start_time.elapsed().as_secs_f64()
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)
        .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?)
}
