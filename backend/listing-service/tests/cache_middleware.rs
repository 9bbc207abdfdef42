//! Integration tests for the response cache middleware.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{test, web, App, HttpResponse};

use listing_service::middleware::cache::CacheResponses;
use response_cache::{Clock, ResponseCache, COLLECTION_TTL_MS, DETAIL_TTL_MS};

struct StepClock(AtomicU64);

impl Clock for StepClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Hits(Arc<AtomicUsize>);

async fn counted(hits: web::Data<Hits>) -> HttpResponse {
    hits.0.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().json(serde_json::json!({ "data": [] }))
}

async fn not_found(hits: web::Data<Hits>) -> HttpResponse {
    hits.0.fetch_add(1, Ordering::SeqCst);
    HttpResponse::NotFound().json(serde_json::json!({ "error": "not_found" }))
}

fn hits() -> Hits {
    Hits(Arc::new(AtomicUsize::new(0)))
}

#[actix_web::test]
async fn second_get_is_served_from_cache() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache))
                    .route("", web::get().to(counted)),
            ),
    )
    .await;

    let first = test::call_service(&app, test::TestRequest::get().uri("/listings").to_request()).await;
    assert_eq!(first.headers().get("X-Cache").unwrap(), "MISS");

    let second =
        test::call_service(&app, test::TestRequest::get().uri("/listings").to_request()).await;
    assert_eq!(second.headers().get("X-Cache").unwrap(), "HIT");

    let body = test::read_body(second).await;
    assert_eq!(body, web::Bytes::from_static(b"{\"data\":[]}"));
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn query_order_does_not_fragment_the_cache() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache))
                    .route("", web::get().to(counted)),
            ),
    )
    .await;

    test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/listings?city=Lisbon&minPrice=100")
            .to_request(),
    )
    .await;
    let reordered = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/listings?minPrice=100&city=Lisbon")
            .to_request(),
    )
    .await;

    assert_eq!(reordered.headers().get("X-Cache").unwrap(), "HIT");
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn nocache_bypasses_read_and_write() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache.clone()))
                    .route("", web::get().to(counted)),
            ),
    )
    .await;

    let bypassed = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/listings?nocache=1")
            .to_request(),
    )
    .await;
    assert!(bypassed.headers().get("X-Cache").is_none());
    assert!(cache.is_empty());

    // Still bypasses once a cached entry exists for the plain path
    test::call_service(&app, test::TestRequest::get().uri("/listings").to_request()).await;
    test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/listings?nocache=1")
            .to_request(),
    )
    .await;
    assert_eq!(hits.0.load(Ordering::SeqCst), 3);
}

#[actix_web::test]
async fn post_requests_are_never_cached() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache.clone()))
                    .route("", web::post().to(counted)),
            ),
    )
    .await;

    let res =
        test::call_service(&app, test::TestRequest::post().uri("/listings").to_request()).await;
    assert!(res.headers().get("X-Cache").is_none());
    assert!(cache.is_empty());
}

#[actix_web::test]
async fn error_responses_are_not_stored() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache.clone()))
                    .route("/{id}", web::get().to(not_found)),
            ),
    )
    .await;

    for _ in 0..2 {
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/listings/missing").to_request(),
        )
        .await;
        assert_eq!(res.headers().get("X-Cache").unwrap(), "MISS");
    }
    assert!(cache.is_empty());
    assert_eq!(hits.0.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn api_mounted_collection_expires_at_collection_ttl() {
    let clock = Arc::new(StepClock(AtomicU64::new(0)));
    let cache = ResponseCache::with_clock(clock.clone());
    let hits = hits();
    let app = test::init_service(
        App::new().app_data(web::Data::new(hits.clone())).service(
            web::scope("/api/v1").service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache))
                    .route("", web::get().to(counted))
                    .route("/{id}", web::get().to(counted)),
            ),
        ),
    )
    .await;

    let uri = "/api/v1/listings";
    test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    let warm = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(warm.headers().get("X-Cache").unwrap(), "HIT");

    // Collection freshness, not the longer detail window
    clock.0.store(COLLECTION_TTL_MS + 1, Ordering::SeqCst);
    let stale = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(stale.headers().get("X-Cache").unwrap(), "MISS");
    assert_eq!(hits.0.load(Ordering::SeqCst), 2);

    // A detail path cached now is still fresh past the collection window
    let detail_uri = "/api/v1/listings/abc-123";
    test::call_service(&app, test::TestRequest::get().uri(detail_uri).to_request()).await;
    clock
        .0
        .store(COLLECTION_TTL_MS + 1 + COLLECTION_TTL_MS, Ordering::SeqCst);
    let detail = test::call_service(
        &app,
        test::TestRequest::get().uri(detail_uri).to_request(),
    )
    .await;
    assert_eq!(detail.headers().get("X-Cache").unwrap(), "HIT");
    assert!(DETAIL_TTL_MS > COLLECTION_TTL_MS);
}

#[actix_web::test]
async fn invalidation_forces_a_refetch() {
    let cache = ResponseCache::new();
    let hits = hits();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(hits.clone()))
            .service(
                web::scope("/listings")
                    .wrap(CacheResponses::new(cache.clone()))
                    .route("", web::get().to(counted)),
            ),
    )
    .await;

    test::call_service(&app, test::TestRequest::get().uri("/listings").to_request()).await;
    cache.invalidate(Some("/listings"));

    let after = test::call_service(
        &app,
        test::TestRequest::get().uri("/listings").to_request(),
    )
    .await;
    assert_eq!(after.headers().get("X-Cache").unwrap(), "MISS");
    assert_eq!(hits.0.load(Ordering::SeqCst), 2);
}
