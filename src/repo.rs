use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
}

#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn get_board(&self, id: Id) -> RepoResult<Board>;
    /// Ids of users holding an admin or super_admin role on the board.
    async fn board_admin_ids(&self, board_id: Id) -> RepoResult<Vec<Id>>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Distinct non-anonymous authors of existing comments on the post.
    async fn comment_author_ids(&self, post_id: Id) -> RepoResult<Vec<Id>>;
}

#[async_trait]
pub trait PrefsRepo: Send + Sync {
    async fn prefs_for(&self, user_id: Id) -> RepoResult<Option<NotificationPrefs>>;
}

pub trait Repo: PostRepo + BoardRepo + CommentRepo + PrefsRepo {}

impl<T> Repo for T where T: PostRepo + BoardRepo + CommentRepo + PrefsRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct State {
        boards: HashMap<Id, Board>,
        posts: HashMap<Id, Post>,
        comments: Vec<Comment>,
        members: Vec<BoardMembership>,
        prefs: HashMap<Id, NotificationPrefs>,
    }

    /// Content snapshot for dev servers and tests. The dispatcher only ever
    /// reads, so the writer side is just seeding.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_board(&self, board: Board) {
            self.state.write().unwrap().boards.insert(board.id, board);
        }

        pub fn insert_post(&self, post: Post) {
            self.state.write().unwrap().posts.insert(post.id, post);
        }

        pub fn insert_comment(&self, comment: Comment) {
            self.state.write().unwrap().comments.push(comment);
        }

        pub fn insert_member(&self, member: BoardMembership) {
            self.state.write().unwrap().members.push(member);
        }

        pub fn insert_prefs(&self, prefs: NotificationPrefs) {
            self.state.write().unwrap().prefs.insert(prefs.user_id, prefs);
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let s = self.state.read().unwrap();
            s.posts.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            let s = self.state.read().unwrap();
            s.boards.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn board_admin_ids(&self, board_id: Id) -> RepoResult<Vec<Id>> {
            let s = self.state.read().unwrap();
            let mut ids: Vec<Id> = Vec::new();
            for m in s.members.iter().filter(|m| m.board_id == board_id) {
                if matches!(m.role, MemberRole::Admin | MemberRole::SuperAdmin)
                    && !ids.contains(&m.user_id)
                {
                    ids.push(m.user_id);
                }
            }
            Ok(ids)
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn comment_author_ids(&self, post_id: Id) -> RepoResult<Vec<Id>> {
            let s = self.state.read().unwrap();
            let mut ids: Vec<Id> = Vec::new();
            for c in s.comments.iter().filter(|c| c.post_id == post_id) {
                if let Some(uid) = c.user_id {
                    if !ids.contains(&uid) {
                        ids.push(uid);
                    }
                }
            }
            Ok(ids)
        }
    }

    #[async_trait]
    impl PrefsRepo for InMemRepo {
        async fn prefs_for(&self, user_id: Id) -> RepoResult<Option<NotificationPrefs>> {
            let s = self.state.read().unwrap();
            Ok(s.prefs.get(&user_id).cloned())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(
                "SELECT id, board_id, user_id, title, description, status, created_at \
                 FROM feedback_posts WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }
    }

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            sqlx::query_as::<_, Board>(
                "SELECT id, slug, title, owner_id FROM boards WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn board_admin_ids(&self, board_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>(
                "SELECT DISTINCT user_id FROM board_members \
                 WHERE board_id = $1 AND role IN ('admin', 'super_admin')",
            )
            .bind(board_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn comment_author_ids(&self, post_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>(
                "SELECT DISTINCT user_id FROM feedback_comments \
                 WHERE post_id = $1 AND user_id IS NOT NULL",
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
        }
    }

    #[async_trait]
    impl PrefsRepo for PgRepo {
        async fn prefs_for(&self, user_id: Id) -> RepoResult<Option<NotificationPrefs>> {
            sqlx::query_as::<_, NotificationPrefs>(
                "SELECT user_id, email_new_comment, email_status_change, email_new_post \
                 FROM notification_preferences WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
        }
    }
}
