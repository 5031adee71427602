use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::config::WarehouseConfig;
use crate::error::{Error, Result};
use crate::types::{RawEvent, TRACKED_EVENT_KINDS};

/// A source of raw activity records for a set of tracked logins over one
/// day. Restartable per invocation: a retry re-fetches the same window.
/// Idempotency is owned downstream by the contribution recorder.
pub trait EventSource: Send + Sync {
    fn fetch_window(&self, logins: &[String], window: FetchWindow) -> Result<Vec<RawEvent>>;
}

/// The day of activity a batch covers. The daily job always asks for
/// yesterday, so a day's archive partition is complete when queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub date: NaiveDate,
}

impl FetchWindow {
    pub fn yesterday() -> Self {
        let date = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap_or_else(|| Utc::now().date_naive());
        Self { date }
    }
}

#[derive(Debug, Serialize)]
struct WindowQuery<'a> {
    date: NaiveDate,
    event_kinds: &'a [&'a str],
    actor_logins: &'a [String],
}

/// Client for the event warehouse query API. Filters server-side to the
/// contribution-relevant event kinds and the tracked logins; transient
/// failures are retried with capped exponential backoff.
pub struct WarehouseClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
    max_retries: u32,
}

impl WarehouseClient {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config("warehouse.base_url is not set".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            max_retries: config.max_retries,
        })
    }

    fn query_once(&self, query: &WindowQuery<'_>) -> Result<Vec<RawEvent>> {
        let url = format!("{}/api/v1/events/query", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(query)
            .send()?;

        if resp.status().is_client_error() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(Error::Warehouse(format!("{status}: {body}")));
        }

        let events: Vec<RawEvent> = resp.error_for_status()?.json()?;
        Ok(events)
    }
}

fn is_transient(err: &Error) -> bool {
    match err {
        Error::Upstream(e) => e.is_timeout() || e.is_connect() || e.is_status(),
        _ => false,
    }
}

impl EventSource for WarehouseClient {
    fn fetch_window(&self, logins: &[String], window: FetchWindow) -> Result<Vec<RawEvent>> {
        let query = WindowQuery {
            date: window.date,
            event_kinds: &TRACKED_EVENT_KINDS,
            actor_logins: logins,
        };

        let mut attempt = 0;
        loop {
            match self.query_once(&query) {
                Ok(events) => return Ok(events),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    let jitter = rand::thread_rng().gen_range(0..250u64);
                    let backoff = Duration::from_millis(500 * 2u64.pow(attempt) + jitter);
                    warn!(
                        "warehouse query failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_retries,
                        backoff,
                        e
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
