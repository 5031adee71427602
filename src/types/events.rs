use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream event kinds relevant to contribution scoring. The warehouse
/// query filters to this allow-list server-side.
pub const TRACKED_EVENT_KINDS: [&str; 4] = [
    "PullRequestEvent",
    "IssuesEvent",
    "PushEvent",
    "IssueCommentEvent",
];

/// A raw activity record as returned by the event warehouse. Ephemeral;
/// fetched per batch and never stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "event_id")]
    pub id: String,
    #[serde(rename = "event_kind")]
    pub kind: String,
    pub actor_id: i64,
    pub actor_login: String,
    pub repo_id: i64,
    pub repo_name: String,
    pub repo_url: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

/// Partial decode of an event payload. Every field is optional so that
/// missing sub-objects classify as unrecognized instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub pull_request: Option<PullRequestInfo>,
    #[serde(default)]
    pub issue: Option<IssueInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestInfo {
    #[serde(default)]
    pub merged: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueInfo {
    #[serde(default)]
    pub state_reason: Option<String>,
}

impl EventPayload {
    /// Decodes a raw payload string. Unknown fields are ignored; only a
    /// syntactically broken payload fails.
    pub fn decode(raw: &str) -> crate::error::Result<Self> {
        let payload = serde_json::from_str(raw)?;
        Ok(payload)
    }

    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }

    pub fn merged(&self) -> bool {
        self.pull_request
            .as_ref()
            .and_then(|pr| pr.merged)
            .unwrap_or(false)
    }

    pub fn state_reason(&self) -> &str {
        self.issue
            .as_ref()
            .and_then(|i| i.state_reason.as_deref())
            .unwrap_or("")
    }
}

/// Domain contribution types produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributionType {
    PullRequestMerged,
    PullRequestOpened,
    PullRequestUpdated,
    IssueOpened,
    IssueClosed,
    IssueResolved,
    IssueComment,
}

impl ContributionType {
    pub const ALL: [ContributionType; 7] = [
        ContributionType::PullRequestMerged,
        ContributionType::PullRequestOpened,
        ContributionType::PullRequestUpdated,
        ContributionType::IssueOpened,
        ContributionType::IssueClosed,
        ContributionType::IssueResolved,
        ContributionType::IssueComment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContributionType::PullRequestMerged => "PullRequestMerged",
            ContributionType::PullRequestOpened => "PullRequestOpened",
            ContributionType::PullRequestUpdated => "PullRequestUpdated",
            ContributionType::IssueOpened => "IssueOpened",
            ContributionType::IssueClosed => "IssueClosed",
            ContributionType::IssueResolved => "IssueResolved",
            ContributionType::IssueComment => "IssueComment",
        }
    }
}

impl std::fmt::Display for ContributionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
