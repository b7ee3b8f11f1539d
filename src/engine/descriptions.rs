use crate::browser::{ActionOutcome, BrowserSession, SessionFactory};
use crate::config::ScanConfig;
use crate::error::SessionError;
use crate::model::ListingRecord;
use crate::parsers::text;
use crate::results::ExtractionStatus;
use crate::utils::{backoff_delay, truncate_chars};
use futures::future::join_all;
use std::time::Duration;

/// Description text of one listing
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDescription {
    pub record: ListingRecord,
    pub text: String,
    pub status: ExtractionStatus,
}

impl FetchedDescription {
    fn incomplete(record: ListingRecord) -> Self {
        Self {
            record,
            text: String::new(),
            status: ExtractionStatus::ExtractionIncomplete,
        }
    }
}

/// Loads detail pages with a small pool of sessions
pub struct DescriptionFetcher<'a> {
    factory: &'a dyn SessionFactory,
    concurrency: usize,
    step_retries: u32,
    backoff: Duration,
    max_chars: usize,
}

impl<'a> DescriptionFetcher<'a> {
    pub fn new(factory: &'a dyn SessionFactory, config: &ScanConfig) -> Self {
        Self {
            factory,
            concurrency: config.detail_concurrency.max(1),
            step_retries: config.step_retries,
            backoff: config.retry_backoff(),
            max_chars: config.max_description_chars,
        }
    }

    /// Fetches every record, output in input order. A listing whose page
    /// cannot be read is kept as `ExtractionIncomplete`. Only a second crash
    /// of the company's own session is an error.
    pub async fn fetch(
        &self,
        primary: &mut BrowserSession,
        records: Vec<ListingRecord>,
    ) -> Result<Vec<FetchedDescription>, SessionError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let wanted = self.concurrency.min(records.len());
        let mut extra = Vec::new();
        for i in 1..wanted {
            match self.factory.create().await {
                Ok(driver) => {
                    let label = format!("{}/detail-{}", primary.label(), i);
                    extra.push(primary.sibling(driver, &label));
                }
                Err(e) => {
                    ::log::warn!(
                        "[{}] extra detail session unavailable, continuing with {}: {}",
                        primary.label(),
                        extra.len() + 1,
                        e
                    );
                    break;
                }
            }
        }

        let lanes = extra.len() + 1;
        let mut assigned: Vec<Vec<(usize, ListingRecord)>> = vec![Vec::new(); lanes];
        for (index, record) in records.into_iter().enumerate() {
            assigned[index % lanes].push((index, record));
        }

        let sessions = std::iter::once(primary).chain(extra.iter_mut());
        let results = join_all(
            sessions
                .zip(assigned)
                .enumerate()
                .map(|(lane, (session, work))| self.run_lane(session, work, lane == 0)),
        )
        .await;

        for session in extra {
            session.close().await;
        }

        let mut fetched = Vec::new();
        for (lane, result) in results.into_iter().enumerate() {
            match result {
                Ok(items) => fetched.extend(items),
                Err(e) if lane == 0 => return Err(e),
                Err(_) => {}
            }
        }
        fetched.sort_by_key(|(index, _)| *index);
        Ok(fetched.into_iter().map(|(_, item)| item).collect())
    }

    /// One session works through its share. An extra session that dies marks
    /// the rest of its share incomplete instead of failing the company.
    async fn run_lane(
        &self,
        session: &mut BrowserSession,
        work: Vec<(usize, ListingRecord)>,
        primary: bool,
    ) -> Result<Vec<(usize, FetchedDescription)>, SessionError> {
        let mut done = Vec::with_capacity(work.len());
        let mut pending = work.into_iter();

        while let Some((index, record)) = pending.next() {
            match self.fetch_one(session, record.clone()).await {
                Ok(item) => done.push((index, item)),
                Err(e) => {
                    ::log::error!("[{}] detail session lost: {}", session.label(), e);
                    if !primary {
                        done.push((index, FetchedDescription::incomplete(record)));
                        done.extend(pending.map(|(i, r)| (i, FetchedDescription::incomplete(r))));
                        return Ok(done);
                    }
                    return Err(e);
                }
            }
        }
        Ok(done)
    }

    async fn fetch_one(
        &self,
        session: &mut BrowserSession,
        record: ListingRecord,
    ) -> Result<FetchedDescription, SessionError> {
        let mut attempt = 0;
        loop {
            match session.open(&record.detail_url).await {
                ActionOutcome::Applied => break,
                ActionOutcome::CrashedSession => session.recover().await?,
                outcome @ (ActionOutcome::ElementNotFound | ActionOutcome::NavigationTimeout) => {
                    if attempt >= self.step_retries {
                        ::log::warn!(
                            "[{}] gave up on {} ({:?})",
                            session.label(),
                            record.detail_url,
                            outcome
                        );
                        return Ok(FetchedDescription::incomplete(record));
                    }
                }
            }
            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
            attempt += 1;
        }

        let cleaned = text::clean(&session.current().text);
        let description = truncate_chars(&cleaned, self.max_chars);
        let status = if description.trim().is_empty() {
            ::log::warn!("[{}] no description text at {}", session.label(), record.detail_url);
            ExtractionStatus::ExtractionIncomplete
        } else {
            ExtractionStatus::Complete
        };
        ::log::debug!(
            "[{}] description of {}: {} words",
            session.label(),
            record.detail_url,
            text::word_count(&description)
        );
        Ok(FetchedDescription {
            record,
            text: description,
            status,
        })
    }
}
