//! Persistence boundary: the known-listing index read before a scan and
//! the results written after it.

use crate::error::StoreError;
use crate::model::{Company, KnownListingIndex};
use crate::results::{ScanAttempt, ScannedListing};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Normalized detail URLs already stored for the company
    async fn known_index(&self, company: &Company) -> Result<KnownListingIndex, StoreError>;

    /// Persists one attempt and the listings it produced
    async fn record(
        &self,
        company: &Company,
        attempt: &ScanAttempt,
        listings: &[ScannedListing],
    ) -> Result<(), StoreError>;
}

/// Everything stored for one company
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyState {
    #[serde(default)]
    pub known: BTreeSet<String>,
    #[serde(default)]
    pub listings: Vec<ScannedListing>,
    #[serde(default)]
    pub attempts: Vec<ScanAttempt>,
    #[serde(default)]
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl CompanyState {
    fn absorb(&mut self, attempt: &ScanAttempt, listings: &[ScannedListing]) {
        for listing in listings {
            if self.known.insert(listing.record.detail_url.clone()) {
                self.listings.push(listing.clone());
            }
        }
        self.last_scanned_at = Some(attempt.finished_at.unwrap_or(attempt.started_at));
        self.attempts.push(attempt.clone());
    }
}

/// Store contents keyed by company id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub companies: BTreeMap<String, CompanyState>,
}

/// In-process store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the known index of a company
    pub async fn with_known<I, S>(self, company_id: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.lock().await;
            let entry = state.companies.entry(company_id.to_string()).or_default();
            entry.known.extend(urls.into_iter().map(Into::into));
        }
        self
    }

    pub async fn company(&self, company_id: &str) -> Option<CompanyState> {
        self.state.lock().await.companies.get(company_id).cloned()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn known_index(&self, company: &Company) -> Result<KnownListingIndex, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .companies
            .get(&company.id)
            .map(|c| KnownListingIndex::new(c.known.iter().cloned()))
            .unwrap_or_default())
    }

    async fn record(
        &self,
        company: &Company,
        attempt: &ScanAttempt,
        listings: &[ScannedListing],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .companies
            .entry(company.id.clone())
            .or_default()
            .absorb(attempt, listings);
        Ok(())
    }
}

/// Store kept in one JSON file, rewritten after every attempt
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Reads the file; a missing file is an empty store
    pub async fn load(&self) -> Result<StoreState, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreState::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for JsonFileStore {
    async fn known_index(&self, company: &Company) -> Result<KnownListingIndex, StoreError> {
        let _guard = self.lock.lock().await;
        let state = self.load().await?;
        Ok(state
            .companies
            .get(&company.id)
            .map(|c| KnownListingIndex::new(c.known.iter().cloned()))
            .unwrap_or_default())
    }

    async fn record(
        &self,
        company: &Company,
        attempt: &ScanAttempt,
        listings: &[ScannedListing],
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        state
            .companies
            .entry(company.id.clone())
            .or_default()
            .absorb(attempt, listings);
        self.save(&state).await?;
        ::log::debug!(
            "Stored {} listing(s) for {} in {}",
            listings.len(),
            company.id,
            self.path.display()
        );
        Ok(())
    }
}
