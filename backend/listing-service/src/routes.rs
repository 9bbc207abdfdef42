//! Route configuration
//!
//! Centralized route setup. The listings scope sits behind the response
//! cache middleware, which only ever caches GET. Account routes past the
//! login boundary are wrapped in JWT auth; listing mutations authenticate
//! through the `UserId` extractor instead, since they share paths with the
//! public cached reads.

use actix_web::web;

use crate::handlers;
use crate::middleware::cache::CacheResponses;
use crate::middleware::jwt_auth::JwtAuth;
use crate::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::health_check))
            .route(
                "/contact-channels",
                web::get().to(handlers::listings::contact_channels),
            )
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/refresh", web::post().to(handlers::auth::refresh))
                    .service(
                        web::scope("")
                            .wrap(JwtAuth::new(state.tokens.clone()))
                            .route("/logout", web::post().to(handlers::auth::logout))
                            .route("/me", web::get().to(handlers::auth::me)),
                    ),
            )
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(state.cache.clone()))
                    .route("", web::get().to(handlers::listings::list))
                    .route("", web::post().to(handlers::listings::create))
                    .route(
                        "/images/{image_id}",
                        web::delete().to(handlers::listings::delete_image),
                    )
                    .route(
                        "/{listing_id}/images/{image_id}/set-main",
                        web::patch().to(handlers::listings::set_main_image),
                    )
                    .route(
                        "/{id}/images",
                        web::post().to(handlers::listings::upload_images),
                    )
                    .route("/{id}", web::get().to(handlers::listings::get))
                    .route("/{id}", web::patch().to(handlers::listings::update))
                    .route("/{id}", web::delete().to(handlers::listings::remove)),
            ),
    );
}
