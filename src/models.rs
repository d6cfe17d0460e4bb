use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Supabase-era schema keys everything by UUID
pub type Id = Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub board_id: Id,
    pub user_id: Option<Id>, // None for anonymous posts
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Board {
    pub id: Id,
    pub slug: String,
    pub title: String,
    pub owner_id: Id,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub user_id: Option<Id>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardMembership {
    pub board_id: Id,
    pub user_id: Id,
    pub role: MemberRole,
}

/// Per-user notification opt-outs. A missing row, or an unset flag, means
/// "notify": silence is consent here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationPrefs {
    pub user_id: Id,
    pub email_new_comment: Option<bool>,
    pub email_status_change: Option<bool>,
    pub email_new_post: Option<bool>,
}

impl NotificationPrefs {
    /// True unless the flag for this event is explicitly switched off.
    pub fn allows(&self, kind: EventType) -> bool {
        let flag = match kind {
            EventType::NewComment => self.email_new_comment,
            EventType::StatusChange => self.email_status_change,
            EventType::NewPost => self.email_new_post,
            EventType::Unknown => None,
        };
        flag != Some(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewComment,
    StatusChange,
    NewPost,
    // Callers may ship event types this revision does not fan out yet;
    // tolerate instead of rejecting the whole request.
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NewComment => "new_comment",
            EventType::StatusChange => "status_change",
            EventType::NewPost => "new_post",
            EventType::Unknown => "unknown",
        }
    }
}

/// Event descriptor posted by the comment / status / post creation flows
/// after they have committed their own write.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub post_id: Id,
    #[serde(default)]
    pub triggered_by: Option<Id>,
    /// Required for `status_change`.
    #[serde(default)]
    pub new_status: Option<String>,
    /// Required for `new_comment`.
    #[serde(default)]
    pub comment_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_snake_case() {
        let req: DispatchRequest = serde_json::from_str(
            r#"{"type":"new_comment","postId":"6a6f1d9e-3c89-4d2c-9f6e-0a1b2c3d4e5f","commentContent":"hi"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, EventType::NewComment);
        assert_eq!(req.comment_content.as_deref(), Some("hi"));
        assert!(req.triggered_by.is_none());
    }

    #[test]
    fn unknown_event_type_is_tolerated() {
        // new_vote existed in an earlier revision of the payload
        let req: DispatchRequest = serde_json::from_str(
            r#"{"type":"new_vote","postId":"6a6f1d9e-3c89-4d2c-9f6e-0a1b2c3d4e5f"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, EventType::Unknown);
    }

    #[test]
    fn prefs_default_to_notify() {
        let prefs = NotificationPrefs {
            user_id: Uuid::new_v4(),
            email_new_comment: None,
            email_status_change: Some(true),
            email_new_post: Some(false),
        };
        assert!(prefs.allows(EventType::NewComment));
        assert!(prefs.allows(EventType::StatusChange));
        assert!(!prefs.allows(EventType::NewPost));
    }
}
