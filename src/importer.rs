use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ImportError;
use crate::grid::Grid;
use crate::grouping::sort_and_group_by_date;
use crate::loader::parse_csv;
use crate::relay::{PollPolicy, QueryRelay, poll_until_ready};

/// What a piece of user input refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportSource {
    /// CSV text pasted directly.
    Raw(String),
    /// Address of a CSV document.
    Url(String),
    /// Identifier of a saved analytics query.
    Query(String),
}

/// Decides how to acquire `input`
///
/// Anything with a comma or a line break is CSV text, anything starting
/// with `http` is a URL and the rest is a query id. Blank input is rejected
/// before any network traffic.
///
/// # Examples
/// ```
/// use gridchart::importer::{classify, ImportSource};
///
/// assert_eq!(classify("a,b\n1,2").unwrap(), ImportSource::Raw("a,b\n1,2".into()));
/// assert_eq!(classify("https://x.io/d.csv").unwrap(), ImportSource::Url("https://x.io/d.csv".into()));
/// assert_eq!(classify(" 4321 ").unwrap(), ImportSource::Query("4321".into()));
/// assert!(classify("   ").is_err());
/// ```
pub fn classify(input: &str) -> Result<ImportSource, ImportError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ImportError::EmptyInput);
    }
    if input.contains(',') || input.contains('\n') {
        Ok(ImportSource::Raw(input.to_string()))
    } else if trimmed.starts_with("http") {
        Ok(ImportSource::Url(trimmed.to_string()))
    } else {
        Ok(ImportSource::Query(trimmed.to_string()))
    }
}

/// Where query ids are resolved.
#[derive(Clone, Debug)]
pub enum QueryBackend {
    /// A relay endpoint taking `{ "queryId": .. }` and answering CSV, or 202
    /// while the query is still running.
    Relay(String),
    /// The analytics service itself.
    Direct(QueryRelay),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Standardize, merge and sort rows by their date key after parsing.
    pub group_by_date: bool,
}

/// Turns user input into a grid.
#[derive(Clone, Debug)]
pub struct Importer {
    client: Client,
    backend: QueryBackend,
    policy: PollPolicy,
}

impl Importer {
    pub fn new(backend: QueryBackend) -> Self {
        Self {
            client: Client::new(),
            backend,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Produces the raw CSV text behind `input`.
    pub async fn fetch_text(&self, input: &str) -> Result<String, ImportError> {
        match classify(input)? {
            ImportSource::Raw(text) => Ok(text),
            ImportSource::Url(url) => self.fetch_url(&url).await,
            ImportSource::Query(id) => self.fetch_query(&id).await,
        }
    }

    /// Fetches, parses and optionally groups `input`.
    ///
    /// Nothing is returned unless every step succeeded, so callers can
    /// replace their grid wholesale.
    pub async fn import(&self, input: &str, options: ImportOptions) -> Result<Grid, ImportError> {
        let text = self.fetch_text(input).await?;
        let grid = parse_csv(&text)?;
        let grid = if options.group_by_date {
            sort_and_group_by_date(&grid)
        } else {
            grid
        };
        info!(
            "imported {} rows x {} columns",
            grid.row_count(),
            grid.column_count()
        );
        Ok(grid)
    }

    async fn fetch_url(&self, url: &str) -> Result<String, ImportError> {
        debug!("fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Fetch {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_query(&self, id: &str) -> Result<String, ImportError> {
        match &self.backend {
            QueryBackend::Direct(relay) => relay.fetch_csv(id).await,
            QueryBackend::Relay(url) => {
                debug!("resolving query {} through {}", id, url);
                let client = &self.client;
                let url = url.as_str();
                let body = json!({ "queryId": id });
                let body = &body;
                poll_until_ready(&self.policy, || async move {
                    let response = client.post(url).json(body).send().await?;
                    let status = response.status().as_u16();
                    let text = response.text().await?;
                    Ok((status, text))
                })
                .await
            }
        }
    }
}
