pub mod comment;
pub mod developer;
pub mod document_fields;
pub mod option_fields;
pub mod project;
pub mod token;
pub mod user;
pub mod validation;
