pub mod auth;
pub mod navigation;
pub mod profile;
pub mod verification;
