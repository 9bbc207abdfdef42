pub mod cache;
pub mod jwt_auth;
