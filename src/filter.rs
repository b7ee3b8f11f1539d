use crate::model::{KnownListingIndex, ListingRecord};
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Query parameters that only track where a visitor came from
const TRACKING_PARAMS: &str = r"(?i)^(utm_[a-z0-9_]*|gclid|fbclid|msclkid|mc_cid|mc_eid|ref|referrer|source|src|trk|gh_src|lever-source|lever-origin)$";

/// Deduplicates listing records against the known index using normalized
/// detail URLs
#[derive(Debug)]
pub struct DedupFilter {
    tracking: Vec<Regex>,
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(&[]).expect("Default tracking patterns should be valid")
    }
}

impl DedupFilter {
    /// Create a filter that also strips query parameters matching `extra_patterns`
    pub fn new(extra_patterns: &[String]) -> Result<Self, regex::Error> {
        let mut tracking = Vec::with_capacity(extra_patterns.len() + 1);
        tracking.push(Regex::new(TRACKING_PARAMS)?);
        for pattern in extra_patterns {
            tracking.push(Regex::new(pattern)?);
        }
        Ok(Self { tracking })
    }

    fn is_tracking(&self, key: &str) -> bool {
        self.tracking.iter().any(|re| re.is_match(key))
    }

    /// Canonical form of a URL: lowercase scheme and host, no default port,
    /// no fragment, no tracking parameters, no trailing slash
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);

        if url.query().is_some() {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !self.is_tracking(k))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                normalized.set_query(None);
            } else {
                normalized.query_pairs_mut().clear().extend_pairs(kept);
            }
        }

        let path = normalized.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            normalized.set_path(path.trim_end_matches('/'));
        }

        normalized
    }

    /// Normalize a raw URL string; `None` when it is empty or not an absolute
    /// http(s) URL
    pub fn normalize_str(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        Some(self.normalize_url(&url).to_string())
    }

    /// Records whose normalized detail URL is neither known nor repeated in the
    /// batch. Returned records carry the normalized URL.
    pub fn filter(
        &self,
        records: &[ListingRecord],
        known: &KnownListingIndex,
    ) -> Vec<ListingRecord> {
        // stored entries may predate normalization
        let known_keys: HashSet<String> = known
            .iter()
            .map(|url| self.normalize_str(url).unwrap_or_else(|| url.clone()))
            .collect();
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for record in records {
            let Some(key) = self.normalize_str(&record.detail_url) else {
                ::log::debug!("Dropping listing without usable URL: {:?}", record.title);
                continue;
            };
            if known_keys.contains(&key) {
                ::log::trace!("Already known: {}", key);
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            fresh.push(ListingRecord {
                detail_url: key,
                ..record.clone()
            });
        }

        ::log::debug!(
            "Dedup kept {} of {} listings ({} known)",
            fresh.len(),
            records.len(),
            known.len()
        );
        fresh
    }
}
