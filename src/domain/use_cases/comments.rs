use futures::stream::BoxStream;
use serde_json::Value;
use validator::Validate;

use crate::{
    entities::{
        comment::{Comment, CommentAuthor, NewCommentRequest, RatingSummary, UpdateCommentRequest},
        document_fields::timestamp,
        token::Claims,
    },
    errors::AppError,
    repositories::{comment::CommentRepository, project::ProjectRepository, user::UserRepository},
    store::{DocumentData, StoreError},
    use_cases::live,
};

/// Comments and the rating aggregate they feed.
///
/// Every comment mutation is followed by a full recomputation of the
/// project's `averageRating` / `totalRatings`. The two writes are not atomic:
/// concurrent mutations on one project race and the last aggregation wins.
pub struct CommentHandler<C, P, U>
where
    C: CommentRepository,
    P: ProjectRepository,
    U: UserRepository,
{
    pub comment_repo: C,
    pub project_repo: P,
    pub user_repo: U,
}

impl<C, P, U> CommentHandler<C, P, U>
where
    C: CommentRepository,
    P: ProjectRepository,
    U: UserRepository,
{
    pub fn new(comment_repo: C, project_repo: P, user_repo: U) -> Self {
        CommentHandler {
            comment_repo,
            project_repo,
            user_repo,
        }
    }

    /// Comments of a project, newest first. Read failures yield an empty list.
    pub async fn list_comments(&self, project_id: &str) -> Vec<Comment> {
        self.comment_repo.list(project_id).await.unwrap_or_else(|e| {
            tracing::error!(project_id = %project_id, "Failed to list comments: {}", e);
            Vec::new()
        })
    }

    /// Recomputes the project's rating from every comment it has and writes
    /// it back.
    pub async fn recalculate_rating(&self, project_id: &str) -> Result<RatingSummary, AppError> {
        let ratings = self.comment_repo.list_ratings(project_id).await?;
        let summary = RatingSummary::from_ratings(ratings);

        self.project_repo
            .write_rating(project_id, summary)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AppError::NotFound(format!("Project {} not found", project_id)),
                other => other.into(),
            })?;

        tracing::debug!(
            project_id = %project_id,
            average = summary.average_rating,
            total = summary.total_ratings,
            "Rating recalculated"
        );
        Ok(summary)
    }

    /// Aggregation after a comment write. Failures leave a stale aggregate
    /// until the next mutation and are only logged.
    async fn refresh_rating(&self, project_id: &str) {
        if let Err(e) = self.recalculate_rating(project_id).await {
            tracing::error!(project_id = %project_id, "Failed to update project rating: {}", e);
        }
    }

    async fn author_of(&self, claims: &Claims) -> CommentAuthor {
        let profile = self
            .user_repo
            .get_user_by_id(&claims.sub)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = %claims.sub, "Failed to read author profile: {}", e);
                None
            });

        match profile {
            Some(user) => CommentAuthor {
                user_id: claims.sub.clone(),
                user_name: user.name,
                user_avatar: user.avatar,
            },
            None => CommentAuthor {
                user_id: claims.sub.clone(),
                user_name: claims.name.clone(),
                user_avatar: None,
            },
        }
    }

    pub async fn add_comment(
        &self,
        project_id: &str,
        claims: &Claims,
        req: NewCommentRequest,
    ) -> Result<Comment, AppError> {
        req.validate()?;

        if self.project_repo.find_by_id(project_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Project {} not found", project_id)));
        }

        let author = self.author_of(claims).await;
        let mut comment = Comment::new(author, &req);
        comment.id = self.comment_repo.insert(project_id, &comment).await?;
        tracing::info!(project_id = %project_id, comment_id = %comment.id, "Comment added");

        self.refresh_rating(project_id).await;
        Ok(comment)
    }

    async fn owned_comment(
        &self,
        project_id: &str,
        comment_id: &str,
        claims: &Claims,
    ) -> Result<Comment, AppError> {
        let comment = self
            .comment_repo
            .find(project_id, comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))?;

        if comment.user_id != claims.sub && !claims.admin {
            tracing::warn!(
                user_id = %claims.sub,
                comment_id = %comment_id,
                "Rejected change to another user's comment"
            );
            return Err(AppError::ForbiddenAccess);
        }
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        project_id: &str,
        comment_id: &str,
        claims: &Claims,
        req: UpdateCommentRequest,
    ) -> Result<Comment, AppError> {
        req.validate()?;
        let mut comment = self.owned_comment(project_id, comment_id, claims).await?;

        let now = timestamp::now();
        let mut changes = DocumentData::new();
        changes.insert("text".to_string(), Value::String(req.text.trim().to_string()));
        changes.insert("rating".to_string(), Value::from(req.rating));
        changes.insert("updatedAt".to_string(), now.clone());
        self.comment_repo.update(project_id, comment_id, changes).await?;

        comment.text = req.text.trim().to_string();
        comment.rating = Some(req.rating.into());
        comment.updated_at = timestamp::parse(&now);
        tracing::info!(project_id = %project_id, comment_id = %comment_id, "Comment updated");

        self.refresh_rating(project_id).await;
        Ok(comment)
    }

    pub async fn delete_comment(
        &self,
        project_id: &str,
        comment_id: &str,
        claims: &Claims,
    ) -> Result<(), AppError> {
        self.owned_comment(project_id, comment_id, claims).await?;

        if !self.comment_repo.delete(project_id, comment_id).await? {
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }
        tracing::info!(project_id = %project_id, comment_id = %comment_id, "Comment deleted");

        self.refresh_rating(project_id).await;
        Ok(())
    }

    pub async fn live_comments(&self, project_id: &str) -> BoxStream<'static, Vec<Comment>> {
        match self.comment_repo.watch(project_id).await {
            Ok(live) => live::snapshots(live, "Comments"),
            Err(e) => live::failed("comments", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::*;
    use serde_json::json;

    use super::*;
    use crate::{
        constants::PROJECTS_COLLECTION,
        entities::{project::Project, token::TokenType, user::User},
        repositories::{
            comment::MockCommentRepository,
            project::MockProjectRepository,
            store_repo::{StoreCommentRepo, StoreProjectRepo, StoreUserRepo},
            user::MockUserRepository,
        },
        store::{memory::MemoryStore, DocumentStore, SharedStore},
    };

    fn claims(sub: &str, admin: bool) -> Claims {
        Claims {
            sub: sub.into(),
            email: format!("{sub}@example.com"),
            name: format!("{sub} from token"),
            admin,
            jti: "jti".into(),
            token_type: TokenType::Access,
            exp: 0,
            iat: 0,
        }
    }

    fn request(text: &str, rating: u8) -> NewCommentRequest {
        NewCommentRequest {
            text: text.into(),
            rating,
        }
    }

    type StoreHandler = CommentHandler<StoreCommentRepo, StoreProjectRepo, StoreUserRepo>;

    async fn store_handler() -> (StoreHandler, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store
            .set(
                PROJECTS_COLLECTION,
                "x",
                json!({"title": "Project X", "slug": "project-x"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let handler = CommentHandler::new(
            StoreCommentRepo::new(store.clone()),
            StoreProjectRepo::new(store.clone()),
            StoreUserRepo::new(store.clone()),
        );
        (handler, store)
    }

    async fn project_rating(store: &SharedStore) -> (f64, u64) {
        let project: Project = store
            .get(PROJECTS_COLLECTION, "x")
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        (project.average_rating, project.total_ratings)
    }

    #[tokio::test]
    async fn aggregate_follows_every_mutation() {
        let (handler, store) = store_handler().await;
        let alice = claims("alice", false);

        handler.add_comment("x", &alice, request("Great", 5)).await.unwrap();
        handler.add_comment("x", &alice, request("Good", 4)).await.unwrap();
        let meh = handler.add_comment("x", &alice, request("Meh", 3)).await.unwrap();
        assert_eq!(project_rating(&store).await, (4.0, 3));

        handler.delete_comment("x", &meh.id, &alice).await.unwrap();
        assert_eq!(project_rating(&store).await, (4.5, 2));
    }

    #[tokio::test]
    async fn update_recomputes_rating() {
        let (handler, store) = store_handler().await;
        let bob = claims("bob", false);

        let comment = handler.add_comment("x", &bob, request("Fine", 2)).await.unwrap();
        let updated = handler
            .update_comment(
                "x",
                &comment.id,
                &bob,
                UpdateCommentRequest {
                    text: "  Better than I thought  ".into(),
                    rating: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.text, "Better than I thought");
        assert_eq!(project_rating(&store).await, (5.0, 1));
    }

    #[tokio::test]
    async fn only_author_or_admin_may_change_a_comment() {
        let (handler, store) = store_handler().await;
        let comment = handler
            .add_comment("x", &claims("alice", false), request("Mine", 4))
            .await
            .unwrap();

        let err = handler
            .delete_comment("x", &comment.id, &claims("mallory", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ForbiddenAccess));

        handler
            .delete_comment("x", &comment.id, &claims("root", true))
            .await
            .unwrap();
        assert_eq!(project_rating(&store).await, (0.0, 0));
    }

    #[tokio::test]
    async fn malformed_comments_stay_listed_counted_and_deletable() {
        let (handler, store) = store_handler().await;
        let path = crate::constants::comments_path("x");
        let fractional = store
            .add(&path, json!({"userId": "legacy", "text": "Imported", "rating": 4.5}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let broken = store
            .add(&path, json!({"userId": "legacy", "text": "Broken", "rating": "five"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        handler.add_comment("x", &claims("alice", false), request("Great", 5)).await.unwrap();

        let summary = handler.recalculate_rating("x").await.unwrap();
        assert_eq!(summary.average_rating, 9.5 / 3.0);
        assert_eq!(summary.total_ratings, 3);
        assert_eq!(handler.list_comments("x").await.len() as u64, summary.total_ratings);

        let admin = claims("root", true);
        handler.delete_comment("x", &broken, &admin).await.unwrap();
        assert_eq!(project_rating(&store).await, (4.75, 2));

        handler.delete_comment("x", &fractional, &admin).await.unwrap();
        assert_eq!(project_rating(&store).await, (5.0, 1));
        assert_eq!(handler.list_comments("x").await.len(), 1);
    }

    #[tokio::test]
    async fn author_snapshot_prefers_profile() {
        let mut comments = MockCommentRepository::new();
        comments
            .expect_insert()
            .withf(|project_id, comment| {
                project_id == "x"
                    && comment.user_name == "Ada Lovelace"
                    && comment.user_avatar.as_deref() == Some("https://img.example.com/ada.png")
                    && comment.text == "Lovely"
            })
            .returning(|_, _| Ok("c1".into()));
        comments.expect_list_ratings().returning(|_| Ok(vec![Some(5.0)]));

        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .with(eq("x"))
            .returning(|_| Ok(Some(serde_json::from_value(json!({"id": "x", "title": "X", "slug": "x"})).unwrap())));
        projects
            .expect_write_rating()
            .withf(|id, summary| id == "x" && summary.total_ratings == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut users = MockUserRepository::new();
        users.expect_get_user_by_id().returning(|id| {
            Ok(Some(User {
                id: id.to_string(),
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                avatar: Some("https://img.example.com/ada.png".into()),
                created_at: None,
                updated_at: None,
            }))
        });

        let handler = CommentHandler::new(comments, projects, users);
        let comment = handler
            .add_comment("x", &claims("ada", false), request("  Lovely  ", 5))
            .await
            .unwrap();
        assert_eq!(comment.id, "c1");
    }

    #[tokio::test]
    async fn comment_on_missing_project_is_not_found() {
        let mut comments = MockCommentRepository::new();
        comments.expect_insert().never();
        let mut projects = MockProjectRepository::new();
        projects.expect_find_by_id().returning(|_| Ok(None));

        let handler = CommentHandler::new(comments, projects, MockUserRepository::new());
        let err = handler
            .add_comment("ghost", &claims("ada", false), request("Hello", 4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_rating_is_rejected_before_any_write() {
        let mut projects = MockProjectRepository::new();
        projects.expect_find_by_id().never();

        let handler = CommentHandler::new(MockCommentRepository::new(), projects, MockUserRepository::new());
        let err = handler
            .add_comment("x", &claims("ada", false), request("Hello", 6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn list_failure_yields_empty() {
        let mut comments = MockCommentRepository::new();
        comments
            .expect_list()
            .returning(|_| Err(StoreError::Unavailable("offline".into())));

        let handler = CommentHandler::new(comments, MockProjectRepository::new(), MockUserRepository::new());
        assert!(handler.list_comments("x").await.is_empty());
    }
}
