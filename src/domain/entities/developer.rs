use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::entities::{
    document_fields::{null_as_default, timestamp},
    validation::*,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewDeveloperRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(
        length(min = MIN_SLUG_LENGTH, max = MAX_SLUG_LENGTH),
        custom(function = "validate_slug")
    )]
    pub slug: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub bio: String,

    #[validate(length(min = 1, max = 500))]
    pub avatar: Option<String>,

    #[validate(custom(function = "validate_url"))]
    pub website: Option<String>,

    #[validate(custom(function = "validate_url"))]
    pub github: Option<String>,

    #[validate(custom(function = "validate_url"))]
    pub linkedin: Option<String>,

    #[validate(custom(function = "validate_url"))]
    pub twitter: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_technologies"))]
    pub skills: Vec<String>,
}

impl TryFrom<NewDeveloperRequest> for Developer {
    type Error = ValidationErrors;

    fn try_from(value: NewDeveloperRequest) -> Result<Self, Self::Error> {
        value.validate()?;

        let slug = match value.slug {
            Some(s) => s,
            None => {
                let generated = slug::slugify(&value.name);
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
        Ok(Developer {
            id: String::new(),
            name: value.name,
            slug,
            bio: value.bio,
            avatar: value.avatar,
            website: value.website,
            github: value.github,
            linkedin: value.linkedin,
            twitter: value.twitter,
            skills: value.skills,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}
