use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::entities::{
    developer::Developer,
    document_fields::{null_as_default, timestamp},
    option_fields::OptionField,
    validation::*,
};

const MIN_DESCRIPTION_LENGTH: u64 = 10;
const MAX_DESCRIPTION_LENGTH: u64 = 2000;
const MAX_CATEGORY_LENGTH: u64 = 60;
const MAX_IMAGE_LENGTH: u64 = 500;
const MAX_FEATURES: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    Intermediate,
    Advanced,
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Complexity::Beginner),
            "intermediate" => Ok(Complexity::Intermediate),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// A showcased app as stored in the `projects` collection.
///
/// `average_rating` and `total_ratings` are derived from the project's
/// comments and only ever written by the rating aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_rating: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_ratings: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub developer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_complexity"
    )]
    pub complexity: Option<Complexity>,
}

fn lenient_complexity<'de, D>(deserializer: D) -> Result<Option<Complexity>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok()))
}

/// A project page: the project plus its developer, when the reference resolves.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub developer: Option<Developer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreatedResponse {
    pub id: String,
    pub slug: String,
}

// ───── Input & Validation Requests ──────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProjectRequest {
    #[validate(
        length(min = MIN_TITLE_LENGTH, max = MAX_TITLE_LENGTH),
        custom(function = "validate_title")
    )]
    pub title: String,

    #[validate(
        length(min = MIN_SLUG_LENGTH, max = MAX_SLUG_LENGTH),
        custom(function = "validate_slug")
    )]
    pub slug: Option<String>,

    #[validate(length(min = MIN_DESCRIPTION_LENGTH, max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,

    #[validate(length(min = 1, max = MAX_IMAGE_LENGTH))]
    pub image: Option<String>,

    #[validate(length(min = 1, max = MAX_CATEGORY_LENGTH))]
    pub category: String,

    #[serde(default)]
    #[validate(custom(function = "validate_technologies"))]
    pub technologies: Vec<String>,

    #[validate(custom(function = "validate_url"))]
    pub demo_url: Option<String>,

    #[validate(custom(function = "validate_url"))]
    pub github_url: Option<String>,

    #[serde(default)]
    #[validate(length(max = MAX_FEATURES))]
    pub features: Vec<String>,

    #[serde(default)]
    pub featured: bool,

    #[serde(default)]
    pub developer_id: String,

    #[validate(length(min = 1, max = MAX_CATEGORY_LENGTH))]
    pub status: Option<String>,

    pub complexity: Option<Complexity>,

    /// Backdates the project; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<NewProjectRequest> for Project {
    type Error = ValidationErrors;

    fn try_from(value: NewProjectRequest) -> Result<Self, Self::Error> {
        value.validate()?;

        let slug = match value.slug {
            Some(s) => s,
            None => {
                let generated = slug::slugify(&value.title);
                if generated.len() < MIN_SLUG_LENGTH as usize {
                    return Err(single_field_error(
                        "slug",
                        "slug_too_short",
                        "Generated slug is too short; please provide a custom slug",
                    ));
                }
                generated
            }
        };

        let now = Utc::now();
        Ok(Project {
            id: String::new(),
            title: value.title,
            slug,
            description: value.description,
            image: value.image,
            category: value.category.trim().to_string(),
            technologies: value.technologies.iter().map(|t| t.trim().to_string()).collect(),
            demo_url: value.demo_url,
            github_url: value.github_url,
            features: value.features,
            created_at: Some(value.created_at.unwrap_or(now)),
            updated_at: Some(now),
            featured: value.featured,
            average_rating: 0.0,
            total_ratings: 0,
            developer_id: value.developer_id,
            status: value.status,
            complexity: value.complexity,
        })
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(
        length(min = MIN_TITLE_LENGTH, max = MAX_TITLE_LENGTH),
        custom(function = "validate_optional_title")
    )]
    pub title: OptionField<String>,

    /// An empty string or `null` regenerates the slug from the title.
    #[validate(
        length(max = MAX_SLUG_LENGTH),
        custom(function = "validate_optional_slug")
    )]
    pub slug: OptionField<String>,

    #[validate(length(min = MIN_DESCRIPTION_LENGTH, max = MAX_DESCRIPTION_LENGTH))]
    pub description: OptionField<String>,

    #[validate(length(min = 1, max = MAX_IMAGE_LENGTH))]
    pub image: OptionField<String>,

    #[validate(length(min = 1, max = MAX_CATEGORY_LENGTH))]
    pub category: OptionField<String>,

    #[validate(custom(function = "validate_optional_technologies"))]
    pub technologies: OptionField<Vec<String>>,

    #[validate(custom(function = "validate_optional_url_field"))]
    pub demo_url: OptionField<String>,

    #[validate(custom(function = "validate_optional_url_field"))]
    pub github_url: OptionField<String>,

    #[validate(length(max = MAX_FEATURES))]
    pub features: OptionField<Vec<String>>,

    pub featured: OptionField<bool>,

    pub developer_id: OptionField<String>,

    #[validate(length(min = 1, max = MAX_CATEGORY_LENGTH))]
    pub status: OptionField<String>,

    pub complexity: OptionField<Complexity>,
}

impl UpdateProjectRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_unchanged()
            && self.slug.is_unchanged()
            && self.description.is_unchanged()
            && self.image.is_unchanged()
            && self.category.is_unchanged()
            && self.technologies.is_unchanged()
            && self.demo_url.is_unchanged()
            && self.github_url.is_unchanged()
            && self.features.is_unchanged()
            && self.featured.is_unchanged()
            && self.developer_id.is_unchanged()
            && self.status.is_unchanged()
            && self.complexity.is_unchanged()
    }

    /// Whether the patch asks for a slug derived from the title.
    pub fn regenerates_slug(&self) -> bool {
        match &self.slug {
            OptionField::SetToNull => true,
            OptionField::SetToValue(s) => s.is_empty(),
            OptionField::Unchanged => false,
        }
    }

    /// Document fields written by this patch. Rating fields are never part of it.
    pub fn to_changes(&self) -> Result<serde_json::Map<String, Value>, serde_json::Error> {
        let mut changes = serde_json::Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                changes.insert(key.to_string(), v);
            }
        };

        put("title", self.title.to_patch_value()?);
        if !self.regenerates_slug() {
            put("slug", self.slug.to_patch_value()?);
        }
        put("description", self.description.to_patch_value()?);
        put("image", self.image.to_patch_value()?);
        put("category", self.category.to_patch_value()?);
        put("technologies", self.technologies.to_patch_value()?);
        put("demoUrl", self.demo_url.to_patch_value()?);
        put("githubUrl", self.github_url.to_patch_value()?);
        put("features", self.features.to_patch_value()?);
        put("featured", self.featured.to_patch_value()?);
        put("developerId", self.developer_id.to_patch_value()?);
        put("status", self.status.to_patch_value()?);
        put("complexity", self.complexity.to_patch_value()?);
        put("updatedAt", Some(timestamp::now()));

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_seed_shaped_documents() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "title": "Nav Store",
            "slug": "nav-store",
            "description": "A project showcase webapp",
            "image": "/projects/navstore.jpg",
            "category": "Portfolio",
            "technologies": ["Next.js", "TypeScript"],
            "features": null,
            "createdAt": "2023-03-12",
            "featured": true,
            "developerId": "dev4",
            "complexity": "expert"
        }))
        .unwrap();

        assert_eq!(project.id, "p1");
        assert!(project.features.is_empty());
        assert!(project.created_at.is_some());
        assert_eq!(project.average_rating, 0.0);
        assert_eq!(project.complexity, None);
    }

    #[test]
    fn new_request_generates_slug() {
        let request: NewProjectRequest = serde_json::from_value(json!({
            "title": "MadMuscles Fitness App",
            "description": "A comprehensive fitness application",
            "category": "Mobile App",
            "technologies": ["React Native", "Firebase"]
        }))
        .unwrap();

        let project = Project::try_from(request).unwrap();
        assert_eq!(project.slug, "madmuscles-fitness-app");
        assert_eq!(project.total_ratings, 0);
        assert!(project.created_at.is_some());
    }

    #[test]
    fn new_request_rejects_bad_urls() {
        let request: NewProjectRequest = serde_json::from_value(json!({
            "title": "Money Tracker",
            "description": "Tracks expenses and revenue",
            "category": "Web App",
            "demoUrl": "javascript:alert(1)"
        }))
        .unwrap();

        let errors = Project::try_from(request).unwrap_err();
        assert!(errors.field_errors().contains_key("demo_url"));
    }

    #[test]
    fn update_changes_only_touch_present_fields() {
        let patch: UpdateProjectRequest = serde_json::from_value(json!({
            "description": "A brand new description",
            "demoUrl": null
        }))
        .unwrap();

        let changes = patch.to_changes().unwrap();
        assert_eq!(changes["description"], "A brand new description");
        assert_eq!(changes["demoUrl"], Value::Null);
        assert!(changes.contains_key("updatedAt"));
        assert!(!changes.contains_key("title"));
        assert!(!changes.contains_key("averageRating"));
    }

    #[test]
    fn clearing_title_is_rejected() {
        let patch: UpdateProjectRequest = serde_json::from_value(json!({"title": null})).unwrap();
        assert!(patch.validate().is_err());
    }

    #[test]
    fn length_errors_carry_the_rejected_value() {
        let patch: UpdateProjectRequest =
            serde_json::from_value(json!({"title": "ab", "features": vec!["x"; MAX_FEATURES as usize + 1]})).unwrap();
        let errors = patch.validate().unwrap_err();
        let field_errors = errors.field_errors();

        assert!(field_errors["title"]
            .iter()
            .any(|e| e.params.get("value") == Some(&json!("ab"))));
        assert!(field_errors.contains_key("features"));
    }
}
