/// Response caching middleware for GET endpoints.
///
/// Hits are served straight from memory with `X-Cache: HIT`. Misses pass
/// through, and only successful responses are stored. A `nocache` query
/// parameter bypasses the cache entirely for that request.
use actix_web::{
    body::{self, BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    Error, HttpResponse,
};
use bytes::Bytes;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use response_cache::{keys, ResponseCache};

const CACHE_HEADER: &str = "X-Cache";
const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub struct CacheResponses {
    cache: ResponseCache,
}

impl CacheResponses {
    pub fn new(cache: ResponseCache) -> Self {
        Self { cache }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CacheResponses
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CacheResponsesService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(CacheResponsesService {
            service: Rc::new(service),
            cache: self.cache.clone(),
        }))
    }
}

pub struct CacheResponsesService<S> {
    service: Rc<S>,
    cache: ResponseCache,
}

impl<S, B> Service<ServiceRequest> for CacheResponsesService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let cache = self.cache.clone();

        Box::pin(async move {
            let query = req.query_string().to_string();
            if req.method() != Method::GET || keys::has_bypass_flag(&query) {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }

            let path = req.path().to_string();
            let key = keys::cache_key(req.method().as_str(), &path, &query);

            if let Some(cached) = cache.get(&key) {
                tracing::debug!(key = %key, "cache hit");
                let (req, _) = req.into_parts();
                let response = HttpResponse::Ok()
                    .insert_header((CACHE_HEADER, "HIT"))
                    .insert_header((header::CONTENT_TYPE, cached.content_type.clone()))
                    .body(cached.payload.clone());
                return Ok(ServiceResponse::new(req, response));
            }

            let res = service.call(req).await?;

            // Errors and redirects pass through uncached
            if !res.status().is_success() {
                let mut res = res.map_into_boxed_body();
                res.headers_mut()
                    .insert(header::HeaderName::from_static("x-cache"), miss_value());
                return Ok(res);
            }

            let (req, res) = res.into_parts();
            let (mut head, response_body) = res.into_parts();

            let payload: Bytes = body::to_bytes(response_body).await.map_err(|_| {
                actix_web::error::ErrorInternalServerError("failed to buffer response body")
            })?;

            let content_type = head
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            cache.set(key, &path, payload.clone(), content_type);

            head.headers_mut()
                .insert(header::HeaderName::from_static("x-cache"), miss_value());
            let res = head.set_body(BoxBody::new(payload));
            Ok(ServiceResponse::new(req, res))
        })
    }
}

fn miss_value() -> header::HeaderValue {
    header::HeaderValue::from_static("MISS")
}
