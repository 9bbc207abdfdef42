pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use contact::ContactRouter;
use object_storage::ObjectStorage;
use response_cache::ResponseCache;
use security::jwt::TokenIssuer;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: ResponseCache,
    pub storage: ObjectStorage,
    pub contacts: ContactRouter,
    pub tokens: TokenIssuer,
}
