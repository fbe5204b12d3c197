use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    domain::password::validate_password_strength,
    entities::{
        document_fields::{null_as_default, timestamp},
        option_fields::OptionField,
        validation::validate_optional_url_field,
    },
};

pub const DEFAULT_USER_NAME: &str = "User";
pub const DEFAULT_GOOGLE_USER_NAME: &str = "Google User";

/// Public profile mirrored in `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Password,
    Google,
}

/// Credential record owned by the identity provider, stored in `accounts`.
/// Never serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
    /// Subject of the external identity (Google `sub`).
    #[serde(default)]
    pub provider_subject: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// What the identity provider reports about a signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Identity {
            uid: account.id.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            photo_url: account.photo_url.clone(),
            provider: account.provider,
        }
    }
}

impl User {
    /// Profile created on first sign-in, named after the provider data.
    pub fn from_identity(identity: &Identity, fallback_name: &str) -> Self {
        let now = Utc::now();
        User {
            id: identity.uid.clone(),
            name: identity
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| fallback_name.to_string()),
            email: identity.email.clone(),
            avatar: identity.photo_url.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 8, message = "Must be at least 8 characters"),
        custom(
            function = "validate_password_strength",
            message = "Must include uppercase, number, and symbol"
        )
    )]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GoogleSignInRequest {
    #[validate(length(min = 1, message = "ID token cannot be empty"))]
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SignOutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: OptionField<String>,

    #[validate(custom(function = "validate_optional_url_field"))]
    pub avatar: OptionField<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_unchanged() && self.avatar.is_unchanged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(display_name: Option<&str>) -> Identity {
        Identity {
            uid: "u1".into(),
            email: "ada@example.com".into(),
            display_name: display_name.map(str::to_string),
            photo_url: None,
            provider: AuthProvider::Google,
        }
    }

    #[test]
    fn profile_falls_back_to_default_name() {
        let user = User::from_identity(&identity(None), DEFAULT_GOOGLE_USER_NAME);
        assert_eq!(user.name, "Google User");
        assert_eq!(user.id, "u1");

        let user = User::from_identity(&identity(Some("Ada")), DEFAULT_USER_NAME);
        assert_eq!(user.name, "Ada");
    }

    #[test]
    fn weak_sign_up_password_is_rejected() {
        let request: SignUpRequest = serde_json::from_value(json!({
            "email": "ada@example.com",
            "password": "password",
            "name": "Ada"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn profile_patch_clears_avatar() {
        let patch: UpdateProfileRequest = serde_json::from_value(json!({"avatar": null})).unwrap();
        assert!(!patch.is_empty());
        assert!(patch.name.is_unchanged());
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn empty_profile_name_is_rejected() {
        let patch: UpdateProfileRequest = serde_json::from_value(json!({"name": ""})).unwrap();
        let errors = patch.validate().unwrap_err();
        assert_eq!(errors.field_errors()["name"][0].params["value"], json!(""));
    }
}
