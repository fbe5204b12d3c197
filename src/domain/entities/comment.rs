use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use validator::{Validate, ValidationError};

use crate::entities::document_fields::{lenient_number, null_as_default, timestamp};

pub const MAX_COMMENT_LENGTH: usize = 1000;

/// A review left on a project, stored under `projects/{project_id}/comments`.
///
/// `user_name` and `user_avatar` are snapshots of the author's profile at the
/// time the comment was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default)]
    pub user_avatar: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// Kept as stored. Missing or non-numeric on malformed documents, which
    /// count as a zero rating.
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: Option<Number>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCommentRequest {
    #[validate(custom(function = "validate_comment_text"))]
    pub text: String,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(custom(function = "validate_comment_text"))]
    pub text: String,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
}

/// The author snapshot stamped onto a new comment.
#[derive(Debug, Clone)]
pub struct CommentAuthor {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
}

impl Comment {
    pub fn new(author: CommentAuthor, request: &NewCommentRequest) -> Self {
        let now = Utc::now();
        Comment {
            id: String::new(),
            user_id: author.user_id,
            user_name: author.user_name,
            user_avatar: author.user_avatar,
            text: request.text.trim().to_string(),
            rating: Some(Number::from(request.rating)),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Aggregate rating written back onto a project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: u64,
}

impl RatingSummary {
    /// Mean of the raw stored values over every comment; a comment without a
    /// numeric rating adds 0 but still counts.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0.0f64, 0u64), |(sum, count), rating| {
                (sum + rating.unwrap_or(0.0), count + 1)
            });

        let average_rating = if count == 0 { 0.0 } else { sum / count as f64 };

        RatingSummary {
            average_rating,
            total_ratings: count,
        }
    }
}

pub fn validate_comment_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("comment_empty");
        err.message = Some(Cow::Borrowed("Comment cannot be empty"));
        return Err(err);
    }
    if trimmed.chars().count() > MAX_COMMENT_LENGTH {
        let mut err = ValidationError::new("comment_too_long");
        err.message = Some(Cow::Borrowed("Comment must be at most 1000 characters"));
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_ratings() {
        let summary = RatingSummary::from_ratings([Some(5.0), Some(4.0), Some(3.0)]);
        assert_eq!(summary.average_rating, 4.0);
        assert_eq!(summary.total_ratings, 3);
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = RatingSummary::from_ratings(std::iter::empty());
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.total_ratings, 0);
    }

    #[test]
    fn unrated_comment_counts_as_zero() {
        let summary = RatingSummary::from_ratings([Some(4.0), None]);
        assert_eq!(summary.average_rating, 2.0);
        assert_eq!(summary.total_ratings, 2);
    }

    #[test]
    fn fractional_ratings_are_not_rounded() {
        let summary = RatingSummary::from_ratings([Some(4.5), Some(5.0)]);
        assert_eq!(summary.average_rating, 4.75);
        assert_eq!(summary.total_ratings, 2);
    }

    #[test]
    fn stored_rating_is_read_leniently() {
        let fractional: Comment = serde_json::from_value(serde_json::json!({"rating": 4.5})).unwrap();
        assert_eq!(fractional.rating.and_then(|n| n.as_f64()), Some(4.5));

        let text: Comment = serde_json::from_value(serde_json::json!({"rating": "five"})).unwrap();
        assert_eq!(text.rating, None);

        let whole: Comment = serde_json::from_value(serde_json::json!({"rating": 3})).unwrap();
        assert_eq!(serde_json::to_value(&whole).unwrap()["rating"], 3);
    }

    #[test]
    fn comment_text_bounds() {
        assert!(validate_comment_text("  great app  ").is_ok());
        assert!(validate_comment_text("   ").is_err());
        assert!(validate_comment_text(&"a".repeat(1001)).is_err());
        assert!(validate_comment_text(&format!(" {} ", "a".repeat(1000))).is_ok());
    }

    #[test]
    fn rating_range_is_enforced() {
        let request = NewCommentRequest { text: "nice".into(), rating: 6 };
        assert!(request.validate().is_err());
        let request = NewCommentRequest { text: "nice".into(), rating: 0 };
        assert!(request.validate().is_err());
    }
}
