pub mod comment;
pub mod developer;
pub mod project;
pub mod store_repo;
pub mod token;
pub mod user;
