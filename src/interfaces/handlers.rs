pub mod auth;
pub mod comments;
pub mod developers;
pub mod home;
pub mod live;
pub mod projects;
pub mod system;
pub mod users;
