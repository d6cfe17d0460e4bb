use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::mailer::{Email, Mailer};
use crate::models::{Board, DispatchRequest, EventType, Id, Post};
use crate::render;
use crate::repo::{Repo, RepoError};
use crate::directory::UserDirectory;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("post not found")]
    PostNotFound,
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("repository failure: {0}")]
    Repo(#[from] RepoError),
    #[error("template rendering failed: {0}")]
    Render(#[from] askama::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Messages the transport accepted. Diagnostics only; callers must not
    /// gate their own success on it.
    pub sent: usize,
}

/// Computes who to notify for one committed domain event, renders one email
/// per recipient, and attempts each delivery exactly once. Stateless across
/// invocations; every collaborator is injected.
pub struct Dispatcher {
    repo: Arc<dyn Repo>,
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    app_url: String,
}

impl Dispatcher {
    pub fn new(
        repo: Arc<dyn Repo>,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        app_url: impl Into<String>,
    ) -> Self {
        Self { repo, directory, mailer, app_url: app_url.into() }
    }

    /// One dispatch invocation. Per-recipient failures (no email on file,
    /// transport rejection) are logged and excluded from the count; the only
    /// errors that escape are caller bugs (bad payload, unknown post) and
    /// rendering failures.
    pub async fn dispatch(&self, req: DispatchRequest) -> Result<DispatchSummary, DispatchError> {
        counter!("notify_dispatches_total", 1, "event" => req.kind.as_str());

        if req.kind == EventType::Unknown {
            warn!(post_id = %req.post_id, "unknown event type, nothing to dispatch");
            return Ok(DispatchSummary { sent: 0 });
        }
        validate_payload(&req)?;

        let post = match self.repo.get_post(req.post_id).await {
            Ok(post) => post,
            Err(RepoError::NotFound) => return Err(DispatchError::PostNotFound),
            Err(e) => return Err(e.into()),
        };
        let board = self.repo.get_board(post.board_id).await?;

        let candidates = self.recipients_for(req.kind, &post, &board, req.triggered_by).await?;
        let eligible = self.filter_by_prefs(req.kind, candidates).await;
        debug!(
            event = req.kind.as_str(),
            post_id = %post.id,
            eligible = eligible.len(),
            "computed recipient set"
        );

        let mut sent = 0usize;
        for user_id in eligible {
            let address = match self.directory.email_for(user_id).await {
                Ok(Some(address)) => address,
                Ok(None) => {
                    debug!(user_id = %user_id, "no email on file, skipping recipient");
                    continue;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "email lookup failed, skipping recipient");
                    continue;
                }
            };

            let is_author = post.user_id == Some(user_id);
            let rendered = self.render(&req, &post, &board, is_author)?;
            let email = Email { to: address, subject: rendered.subject, html: rendered.html };
            match self.mailer.send(&email).await {
                Ok(()) => {
                    sent += 1;
                    counter!("notify_emails_sent_total", 1, "event" => req.kind.as_str());
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "delivery failed, continuing with remaining recipients");
                    counter!("notify_emails_failed_total", 1, "event" => req.kind.as_str());
                }
            }
        }

        Ok(DispatchSummary { sent })
    }

    /// Fire-and-forget handoff: runs the dispatch on its own task with its
    /// own error boundary so the calling flow never blocks on, or fails
    /// because of, notification delivery.
    pub fn dispatch_detached(self: Arc<Self>, req: DispatchRequest) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match self.dispatch(req).await {
                Ok(summary) => debug!(sent = summary.sent, "detached dispatch finished"),
                Err(e) => warn!(error = %e, "detached dispatch failed"),
            }
        })
    }

    /// Per-event recipient rules. Order of insertion is kept so dedup is
    /// deterministic; the actor is excluded everywhere.
    async fn recipients_for(
        &self,
        kind: EventType,
        post: &Post,
        board: &Board,
        triggered_by: Option<Id>,
    ) -> Result<Vec<Id>, DispatchError> {
        let mut recipients: Vec<Id> = Vec::new();
        match kind {
            EventType::NewComment => {
                // Implicit subscription: the author plus everyone who has
                // commented before this event.
                if let Some(author) = post.user_id {
                    if Some(author) != triggered_by {
                        recipients.push(author);
                    }
                }
                for user_id in self.repo.comment_author_ids(post.id).await? {
                    if Some(user_id) == triggered_by || post.user_id == Some(user_id) {
                        continue;
                    }
                    if !recipients.contains(&user_id) {
                        recipients.push(user_id);
                    }
                }
            }
            EventType::StatusChange => {
                if let Some(author) = post.user_id {
                    if Some(author) != triggered_by {
                        recipients.push(author);
                    }
                }
            }
            EventType::NewPost => {
                if Some(board.owner_id) != triggered_by {
                    recipients.push(board.owner_id);
                }
                for user_id in self.repo.board_admin_ids(board.id).await? {
                    if Some(user_id) == triggered_by || user_id == board.owner_id {
                        continue;
                    }
                    if !recipients.contains(&user_id) {
                        recipients.push(user_id);
                    }
                }
            }
            EventType::Unknown => {}
        }
        Ok(recipients)
    }

    /// Opt-out filtering: drop a candidate only on an explicit `false` flag.
    /// A failed lookup keeps the recipient: silence means notify.
    async fn filter_by_prefs(&self, kind: EventType, candidates: Vec<Id>) -> Vec<Id> {
        let mut eligible = Vec::with_capacity(candidates.len());
        for user_id in candidates {
            match self.repo.prefs_for(user_id).await {
                Ok(Some(prefs)) if !prefs.allows(kind) => {
                    debug!(user_id = %user_id, event = kind.as_str(), "recipient opted out");
                }
                Ok(_) => eligible.push(user_id),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "preference lookup failed, defaulting to notify");
                    eligible.push(user_id);
                }
            }
        }
        eligible
    }

    fn render(
        &self,
        req: &DispatchRequest,
        post: &Post,
        board: &Board,
        recipient_is_author: bool,
    ) -> Result<render::Rendered, DispatchError> {
        let rendered = match req.kind {
            EventType::NewComment => {
                // presence checked by validate_payload
                let comment = req.comment_content.as_deref().unwrap_or_default();
                render::new_comment_email(&self.app_url, post, board, comment, recipient_is_author)?
            }
            EventType::StatusChange => {
                let new_status = req.new_status.as_deref().unwrap_or_default();
                render::status_change_email(&self.app_url, post, board, new_status)?
            }
            EventType::NewPost => render::new_post_email(&self.app_url, post, board)?,
            EventType::Unknown => {
                return Err(DispatchError::InvalidEvent("unknown event type".into()))
            }
        };
        Ok(rendered)
    }
}

fn validate_payload(req: &DispatchRequest) -> Result<(), DispatchError> {
    match req.kind {
        EventType::NewComment if req.comment_content.is_none() => Err(
            DispatchError::InvalidEvent("commentContent is required for new_comment".into()),
        ),
        EventType::StatusChange if req.new_status.is_none() => Err(DispatchError::InvalidEvent(
            "newStatus is required for status_change".into(),
        )),
        _ => Ok(()),
    }
}
