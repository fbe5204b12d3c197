use std::borrow::Cow;

use validator::{ValidationError, ValidationErrors};

use crate::entities::option_fields::OptionField;

pub const MIN_TITLE_LENGTH: u64 = 3;
pub const MAX_TITLE_LENGTH: u64 = 120;
pub const MIN_SLUG_LENGTH: u64 = 3;
pub const MAX_SLUG_LENGTH: u64 = 80;
pub const MAX_TECHNOLOGIES: usize = 20;
pub const MAX_TECHNOLOGY_LENGTH: usize = 40;

pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) => {
            if parsed.scheme() == "http" || parsed.scheme() == "https" {
                Ok(())
            } else {
                Err(new_validation_error("invalid_url_scheme", "URL must start with http:// or https://"))
            }
        }
        Err(_) => Err(new_validation_error("invalid_url", "Invalid URL format")),
    }
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(new_validation_error("slug_empty", "Slug cannot be empty"));
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(new_validation_error("slug_invalid_chars", "Slug must contain only lowercase letters, digits, or hyphens"));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(new_validation_error("slug_edge_hyphen", "Slug must not start or end with a hyphen"));
    }
    if slug.contains("--") {
        return Err(new_validation_error("slug_double_hyphen", "Slug must not contain consecutive hyphens"));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().len() != title.len() {
        return Err(new_validation_error("title_whitespace", "Title must not have leading or trailing whitespace"));
    }
    Ok(())
}

pub fn validate_technologies(technologies: &[String]) -> Result<(), ValidationError> {
    if technologies.len() > MAX_TECHNOLOGIES {
        return Err(new_validation_error("too_many_technologies", "Too many technologies provided"));
    }
    for tech in technologies {
        let trimmed = tech.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_TECHNOLOGY_LENGTH {
            return Err(new_validation_error("invalid_technology_length", "Technology names must be 1 to 40 characters"));
        }
    }
    Ok(())
}

pub fn validate_optional_title(value: &OptionField<String>) -> Result<(), ValidationError> {
    match value {
        OptionField::SetToValue(title) => validate_title(title),
        OptionField::SetToNull => Err(new_validation_error("title_required", "Title cannot be cleared")),
        OptionField::Unchanged => Ok(()),
    }
}

pub fn validate_optional_slug(value: &OptionField<String>) -> Result<(), ValidationError> {
    match value {
        // An empty slug asks for regeneration from the title.
        OptionField::SetToValue(slug) if slug.is_empty() => Ok(()),
        OptionField::SetToValue(slug) => validate_slug(slug),
        _ => Ok(()),
    }
}

pub fn validate_optional_url_field(value: &OptionField<String>) -> Result<(), ValidationError> {
    if let OptionField::SetToValue(url) = value {
        validate_url(url)?;
    }
    Ok(())
}

pub fn validate_optional_technologies(value: &OptionField<Vec<String>>) -> Result<(), ValidationError> {
    if let OptionField::SetToValue(technologies) = value {
        validate_technologies(technologies)?;
    }
    Ok(())
}

pub fn new_validation_error(code: &'static str, msg: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(msg));
    err
}

pub fn single_field_error(field: &'static str, code: &'static str, msg: &'static str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, new_validation_error(code, msg));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(validate_slug("nav-store").is_ok());
        assert!(validate_slug("Nav-Store").is_err());
        assert!(validate_slug("-nav").is_err());
        assert!(validate_slug("nav--store").is_err());
    }

    #[test]
    fn technologies_allow_real_names() {
        let techs = vec!["Next.js".to_string(), "Tailwind CSS".to_string(), "C#".to_string()];
        assert!(validate_technologies(&techs).is_ok());
        assert!(validate_technologies(&["  ".to_string()]).is_err());
    }

    #[test]
    fn url_requires_http() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
