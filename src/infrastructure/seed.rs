//! Loads demo content into an empty store.
//!
//! The seed file is a JSON object with `developers`, `users` and `projects`
//! arrays. Every record carries its document `id`; projects may carry a
//! `comments` array. Project rating aggregates are recomputed from the
//! seeded comments, whatever the file says.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    constants::{comments_path, DEVELOPERS_COLLECTION, PROJECTS_COLLECTION, USERS_COLLECTION},
    entities::{comment::RatingSummary, document_fields::timestamp},
    repositories::{
        comment::CommentRepository,
        project::ProjectRepository,
        store_repo::{StoreCommentRepo, StoreProjectRepo},
    },
    store::{DocumentData, Query, SharedStore, StoreError},
};

const TIMESTAMP_FIELDS: [&str; 2] = ["createdAt", "updatedAt"];

#[derive(Debug, Deserialize)]
pub struct SeedRecord {
    pub id: String,
    #[serde(flatten)]
    pub data: DocumentData,
}

#[derive(Debug, Deserialize)]
pub struct SeedProject {
    pub id: String,
    #[serde(default)]
    pub comments: Vec<DocumentData>,
    #[serde(flatten)]
    pub data: DocumentData,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub developers: Vec<SeedRecord>,
    #[serde(default)]
    pub users: Vec<SeedRecord>,
    #[serde(default)]
    pub projects: Vec<SeedProject>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub developers: usize,
    pub users: usize,
    pub projects: usize,
    pub comments: usize,
}

pub fn load_seed_file(path: impl AsRef<Path>) -> anyhow::Result<SeedData> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed seed file {}", path.display()))
}

/// Rewrites parseable timestamps in their stored form, so store ordering is
/// chronological.
fn normalize_timestamps(data: &mut DocumentData) {
    for field in TIMESTAMP_FIELDS {
        if let Some(value) = data.get_mut(field) {
            if let Some(parsed) = timestamp::parse(value) {
                *value = Value::String(timestamp::format(&parsed));
            }
        }
    }
}

/// Writes `seed` unless the store already holds projects. Returns `None`
/// when seeding was skipped.
pub async fn seed_store(store: &SharedStore, seed: SeedData) -> Result<Option<SeedReport>, StoreError> {
    let existing = store
        .query(&Query::collection(PROJECTS_COLLECTION).limit(1))
        .await?;
    if !existing.is_empty() {
        tracing::info!("Store already holds projects; skipping seed");
        return Ok(None);
    }

    let mut report = SeedReport::default();

    for mut developer in seed.developers {
        normalize_timestamps(&mut developer.data);
        store.set(DEVELOPERS_COLLECTION, &developer.id, developer.data).await?;
        report.developers += 1;
    }

    for mut user in seed.users {
        normalize_timestamps(&mut user.data);
        store.set(USERS_COLLECTION, &user.id, user.data).await?;
        report.users += 1;
    }

    let projects = StoreProjectRepo::new(store.clone());
    let comments = StoreCommentRepo::new(store.clone());

    for mut project in seed.projects {
        normalize_timestamps(&mut project.data);
        store.set(PROJECTS_COLLECTION, &project.id, project.data).await?;

        let path = comments_path(&project.id);
        for mut comment in project.comments {
            normalize_timestamps(&mut comment);
            match comment.remove("id") {
                Some(Value::String(id)) => store.set(&path, &id, comment).await?,
                _ => {
                    store.add(&path, comment).await?;
                }
            }
            report.comments += 1;
        }

        let summary = RatingSummary::from_ratings(comments.list_ratings(&project.id).await?);
        projects.write_rating(&project.id, summary).await?;
        report.projects += 1;
    }

    tracing::info!(
        developers = report.developers,
        users = report.users,
        projects = report.projects,
        comments = report.comments,
        "Store seeded"
    );
    Ok(Some(report))
}
