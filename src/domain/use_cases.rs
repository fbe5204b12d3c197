pub mod auth;
pub mod catalog;
pub mod comments;
pub mod developers;
pub mod extractors;
pub mod live;
pub mod projects;
