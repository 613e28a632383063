//! Data models exchanged with the query gateway

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single tabular record as returned by the gateway
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Sentinel result id used when no tool result correlates to a turn
pub const NO_RESULT_ID: &str = "-";

// ============================================================================
// Repository identity
// ============================================================================

/// `(owner, name)` pair identifying a tracked repository (case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, owner: &str, name: &str) -> bool {
        self.owner == owner && self.name == name
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/name, got '{}'", s)),
        }
    }
}

// ============================================================================
// Import status
// ============================================================================

/// Pipeline status of the most recent import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Success,
    Running,
    Failed,
}

/// Coarse import health, as shown next to the repository name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportHealth {
    Success,
    Running,
    /// Import succeeded but some data sets were not loaded
    Warning,
    Error,
}

/// Snapshot of a repository's import state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    #[serde(default)]
    pub pipeline_status: Option<PipelineStatus>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_pipeline_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub loaded_issues: bool,
    #[serde(default)]
    pub loaded_stars: bool,
    #[serde(default)]
    pub loaded_pull_requests: bool,
    #[serde(default)]
    pub loaded_commits: bool,
}

impl RepoInfo {
    fn all_loaded(&self) -> bool {
        self.loaded_issues && self.loaded_stars && self.loaded_pull_requests && self.loaded_commits
    }

    /// An import attempt has concluded (successfully or not).
    ///
    /// A FAILED run with a timestamp also counts; callers that care must
    /// look at [`health`](Self::health).
    pub fn has_concluded(&self) -> bool {
        self.last_pipeline_run.is_some() || self.pipeline_status == Some(PipelineStatus::Success)
    }

    /// SUCCESS and every data set loaded
    pub fn is_fully_loaded(&self) -> bool {
        self.pipeline_status == Some(PipelineStatus::Success) && self.all_loaded()
    }

    /// SUCCESS but a partial import
    pub fn is_degraded(&self) -> bool {
        self.pipeline_status == Some(PipelineStatus::Success) && !self.all_loaded()
    }

    pub fn health(&self) -> ImportHealth {
        match self.pipeline_status {
            Some(PipelineStatus::Running) => ImportHealth::Running,
            Some(PipelineStatus::Success) if self.all_loaded() => ImportHealth::Success,
            Some(PipelineStatus::Success) => ImportHealth::Warning,
            _ => ImportHealth::Error,
        }
    }

    /// One-line status text, e.g. "Last import: 5 minutes ago"
    pub fn last_import_summary(&self, now: DateTime<Utc>) -> String {
        match self.pipeline_status {
            Some(PipelineStatus::Success) => {
                format!("Last import: {}", relative_time(self.last_pipeline_run, now))
            }
            Some(PipelineStatus::Running) => "Import currently in progress".to_string(),
            _ => "Import failed".to_string(),
        }
    }
}

/// Human-readable age of a timestamp relative to `now`
pub fn relative_time(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };
    let secs = (now - at).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86_400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86_400)
    }
}

/// Accepts RFC 3339 timestamps as well as naive ISO timestamps (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

// ============================================================================
// Query results
// ============================================================================

/// Rows plus the query the gateway generated for them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub rows: Vec<Row>,
    pub generated_query: String,
    pub result_id: String,
}

/// Free-text answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResult {
    pub answer: String,
    pub result_id: String,
}

/// Body of the tabular and text query endpoints
#[derive(Debug, Serialize)]
pub(crate) struct PromptBody<'a> {
    pub prompt: &'a str,
}

/// Wire shape of `POST /data`
#[derive(Debug, Deserialize)]
pub(crate) struct WireTabular {
    #[serde(default)]
    pub sql_result: Option<Vec<Row>>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl From<WireTabular> for TabularResult {
    fn from(wire: WireTabular) -> Self {
        Self {
            rows: wire.sql_result.unwrap_or_default(),
            generated_query: wire.sql.unwrap_or_default(),
            result_id: wire.id.unwrap_or_else(|| NO_RESULT_ID.to_string()),
        }
    }
}

/// Wire shape of `POST /prompt`
#[derive(Debug, Deserialize)]
pub(crate) struct WireText {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl WireText {
    pub fn into_result(self) -> Option<TextResult> {
        let answer = self.text.or(self.detail)?;
        Some(TextResult {
            answer,
            result_id: self.id.unwrap_or_else(|| NO_RESULT_ID.to_string()),
        })
    }
}

// ============================================================================
// Import trigger
// ============================================================================

/// Body of `POST /load-github-data`
#[derive(Debug, Clone, Serialize)]
pub struct ImportRequest {
    pub owner: String,
    pub repo: String,
    pub access_token: String,
    pub load_issues: bool,
    pub load_pull_requests: bool,
    pub load_stars: bool,
    pub load_commits: bool,
}

impl ImportRequest {
    /// Full import of every data set
    pub fn full(repo: &RepoId, access_token: impl Into<String>) -> Self {
        Self {
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            access_token: access_token.into(),
            load_issues: true,
            load_pull_requests: true,
            load_stars: true,
            load_commits: true,
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Thumbs up / thumbs down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "up" | "+" => Ok(Sentiment::Positive),
            "negative" | "down" | "-" => Ok(Sentiment::Negative),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

/// Body of `POST /feedback`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "chat_id")]
    pub result_id: String,
    #[serde(rename = "type")]
    pub sentiment: Sentiment,
    pub message: String,
}

/// Response of `POST /feedback`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub pr_url: Option<String>,
}
