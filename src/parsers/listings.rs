use crate::filter::DedupFilter;
use crate::model::{ListingRecord, ScrollDirection, NavigationAction};
use crate::snapshot::{ElementRole, PageElement, PageSnapshot};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Labels of controls that advance to more results
static ADVANCE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(next( page)?|next results|load more( jobs| results| positions)?|show more( jobs| results| positions)?|more (jobs|results|positions|openings)|view more( jobs)?|see more( jobs)?|›|»|>|→|next\s*[›»>→])\s*$",
    )
    .expect("valid advance label regex")
});

/// Labels that are pagination chrome, never listings
static PAGER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+|prev(ious)?( page)?|first|last|[‹«<←]|page \d+)\s*$")
        .expect("valid pager label regex")
});

/// Pulls listing records out of snapshots
#[derive(Debug)]
pub struct ListingExtractor {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ListingExtractor {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self, regex::Error> {
        let include = include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { include, exclude })
    }

    /// Links that look like job detail pages, unique by normalized URL
    pub fn extract(
        &self,
        snapshot: &PageSnapshot,
        company_id: &str,
        normalizer: &DedupFilter,
    ) -> Vec<ListingRecord> {
        let page = Url::parse(&snapshot.url).ok();
        let page_key = normalizer.normalize_str(&snapshot.url);
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for element in &snapshot.elements {
            if element.role != ElementRole::Link {
                continue;
            }
            let Some(href) = element.href.as_deref() else {
                continue;
            };
            let title = element.label.trim();
            if title.is_empty() || ADVANCE_LABEL.is_match(title) || PAGER_LABEL.is_match(title) {
                continue;
            }
            let Some(key) = normalizer.normalize_str(href) else {
                continue;
            };
            if page_key.as_deref() == Some(key.as_str()) {
                continue;
            }
            if !self.is_listing_link(&key, page.as_ref()) {
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            records.push(ListingRecord {
                title: title.to_string(),
                detail_url: key,
                location_text: element.context.clone(),
                source_company_id: company_id.to_string(),
            });
        }

        ::log::debug!("Extracted {} listings from {}", records.len(), snapshot.url);
        records
    }

    /// A link is a listing when it matches an include pattern, or when it lives
    /// on the listing page's host strictly below the listing page's path
    fn is_listing_link(&self, url: &str, page: Option<&Url>) -> bool {
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }
        if self.include.iter().any(|re| re.is_match(url)) {
            return true;
        }
        let (Some(page), Ok(link)) = (page, Url::parse(url)) else {
            return false;
        };
        let base = page.path().trim_end_matches('/');
        link.host_str() == page.host_str()
            && !base.is_empty()
            && link.path().len() > base.len() + 1
            && link.path().starts_with(&format!("{base}/"))
    }
}

/// A next-page or load-more control on the page, if one is enabled
pub fn find_advance_control(snapshot: &PageSnapshot) -> Option<&PageElement> {
    snapshot.elements.iter().find(|e| {
        matches!(e.role, ElementRole::Link | ElementRole::Button)
            && !e.disabled
            && ADVANCE_LABEL.is_match(&e.label)
    })
}

/// Action that advances to more results using the page's own controls
pub fn advance_action(snapshot: &PageSnapshot) -> Option<NavigationAction> {
    find_advance_control(snapshot).map(|e| NavigationAction::Click(e.reference.clone()))
}

/// Scrolling stands in for a control on infinite-scroll pages
pub fn scroll_action() -> NavigationAction {
    NavigationAction::Scroll(ScrollDirection::Down)
}
