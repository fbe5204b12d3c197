use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

pub const PROJECTS_COLLECTION: &str = "projects";
pub const DEVELOPERS_COLLECTION: &str = "developers";
pub const USERS_COLLECTION: &str = "users";
pub const ACCOUNTS_COLLECTION: &str = "accounts";
pub const COMMENTS_COLLECTION: &str = "comments";

pub const MAX_LIST_LIMIT: usize = 100;

/// Path of the comment sub-collection of one project.
pub fn comments_path(project_id: &str) -> String {
    format!("{PROJECTS_COLLECTION}/{project_id}/{COMMENTS_COLLECTION}")
}
