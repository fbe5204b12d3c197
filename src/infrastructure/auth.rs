pub mod google;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod revocation;
