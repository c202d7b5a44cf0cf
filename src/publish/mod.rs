use crate::github::{Comment, PullRequestHost, Result};

/// Prefix of every report comment; also how an earlier report is found.
pub const COMMENT_HEADER: &str = "## Flow Coverage\n";

/// What `publish` did with the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created(u64),
    Updated(u64),
}

/// The first comment whose body starts with the report header.
pub fn find_existing(comments: &[Comment]) -> Option<&Comment> {
    comments.iter().find(|c| c.body.starts_with(COMMENT_HEADER))
}

/// Full comment body for a rendered table.
pub fn comment_body(table: &str) -> String {
    format!("{}{}", COMMENT_HEADER, table)
}

/// Find-or-create the report comment on the pull request.
pub fn publish(host: &dyn PullRequestHost, table: &str) -> Result<PublishOutcome> {
    let body = comment_body(table);
    let comments = host.list_comments()?;

    let outcome = match find_existing(&comments) {
        Some(existing) => PublishOutcome::Updated(host.update_comment(existing.id, &body)?.id),
        None => PublishOutcome::Created(host.create_comment(&body)?.id),
    };

    tracing::info!(?outcome, "published coverage report");
    Ok(outcome)
}
