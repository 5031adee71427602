use crate::types::{ContributionType, EventPayload};

/// Maps an event kind and its decoded payload to a contribution type.
/// Unrecognized combinations return `None` and the event is skipped;
/// missing payload sub-objects read as empty rather than failing.
pub fn classify(kind: &str, payload: &EventPayload) -> Option<ContributionType> {
    match kind {
        "PullRequestEvent" => match payload.action() {
            "closed" if payload.merged() => Some(ContributionType::PullRequestMerged),
            "opened" => Some(ContributionType::PullRequestOpened),
            _ => None,
        },
        "IssuesEvent" => match (payload.action(), payload.state_reason()) {
            ("opened", _) => Some(ContributionType::IssueOpened),
            ("closed", "not_planned") => Some(ContributionType::IssueClosed),
            ("closed", "completed") => Some(ContributionType::IssueResolved),
            _ => None,
        },
        "PushEvent" => Some(ContributionType::PullRequestUpdated),
        "IssueCommentEvent" => Some(ContributionType::IssueComment),
        _ => None,
    }
}
