use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::listing_repo::{ListingChanges, NewListing};
use crate::error::AppError;
use crate::filters::ListingFilter;
use crate::middleware::jwt_auth::UserId;
use crate::models::{BusinessCode, ListingStatus, ListingType};
use crate::services::listings;
use crate::{AppState, Result};

const MAX_UPLOAD_FILES: usize = 20;
const MAX_FILE_BYTES: usize = 15 * 1024 * 1024;

/// Cache keys touched by listing mutations.
const LISTINGS_KEY_PATTERN: &str = "/listings";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 5000))]
    pub description: String,

    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub status: Option<ListingStatus>,

    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0.0))]
    pub rent_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub condo_fee: Option<f64>,
    #[validate(range(min = 0.0))]
    pub total_area: Option<f64>,
    #[validate(range(min = 0.0))]
    pub built_area: Option<f64>,
    #[validate(range(min = 0))]
    pub bedrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub bathrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub parking_spaces: Option<i32>,

    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub neighborhood: String,

    #[validate(length(min = 1, max = 50))]
    pub code: String,

    pub business_types: Option<Vec<BusinessCode>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub status: Option<ListingStatus>,

    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub rent_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub condo_fee: Option<f64>,
    #[validate(range(min = 0.0))]
    pub total_area: Option<f64>,
    #[validate(range(min = 0.0))]
    pub built_area: Option<f64>,
    #[validate(range(min = 0))]
    pub bedrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub bathrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub parking_spaces: Option<i32>,

    #[validate(length(min = 1, max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub neighborhood: Option<String>,

    pub business_types: Option<Vec<BusinessCode>>,
}

/// POST /api/v1/listings
pub async fn create(
    state: web::Data<AppState>,
    user: UserId,
    req: web::Json<CreateListingRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let new = NewListing {
        title: req.title,
        description: req.description,
        listing_type: req.listing_type,
        status: req.status.unwrap_or(ListingStatus::Available),
        price: req.price,
        rent_price: req.rent_price,
        condo_fee: req.condo_fee,
        total_area: req.total_area,
        built_area: req.built_area,
        bedrooms: req.bedrooms,
        bathrooms: req.bathrooms,
        parking_spaces: req.parking_spaces,
        state: req.state,
        city: req.city,
        neighborhood: req.neighborhood,
        code: req.code,
        user_id: user.0,
    };

    let created = listings::create(&state, new, req.business_types.unwrap_or_default()).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::Created().json(created))
}

/// GET /api/v1/listings
pub async fn list(
    state: web::Data<AppState>,
    filter: web::Query<ListingFilter>,
) -> Result<HttpResponse> {
    filter.validate()?;

    let page = listings::list(&state, &filter).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/v1/listings/{id}
pub async fn get(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let detail = listings::get(&state, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// PATCH /api/v1/listings/{id}
pub async fn update(
    state: web::Data<AppState>,
    _user: UserId,
    path: web::Path<Uuid>,
    req: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let changes = ListingChanges {
        title: req.title,
        description: req.description,
        listing_type: req.listing_type,
        status: req.status,
        price: req.price,
        rent_price: req.rent_price,
        condo_fee: req.condo_fee,
        total_area: req.total_area,
        built_area: req.built_area,
        bedrooms: req.bedrooms,
        bathrooms: req.bathrooms,
        parking_spaces: req.parking_spaces,
        state: req.state,
        city: req.city,
        neighborhood: req.neighborhood,
    };

    let updated =
        listings::update(&state, path.into_inner(), changes, req.business_types).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/v1/listings/{id}
pub async fn remove(
    state: web::Data<AppState>,
    _user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    listings::remove(&state, path.into_inner()).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/listings/{id}/images (multipart)
pub async fn upload_images(
    state: web::Data<AppState>,
    _user: UserId,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let files = collect_files(payload).await?;

    let images = listings::upload_images(&state, path.into_inner(), files).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::Created().json(images))
}

/// PATCH /api/v1/listings/{listing_id}/images/{image_id}/set-main
pub async fn set_main_image(
    state: web::Data<AppState>,
    _user: UserId,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (listing_id, image_id) = path.into_inner();
    listings::set_main_image(&state, listing_id, image_id).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Main image updated" })))
}

/// DELETE /api/v1/listings/images/{image_id}
pub async fn delete_image(
    state: web::Data<AppState>,
    _user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    listings::delete_image(&state, path.into_inner()).await?;
    state.cache.invalidate(Some(LISTINGS_KEY_PATTERN));
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/contact-channels
pub async fn contact_channels(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (channel_a, channel_b) = state.contacts.channels();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "channelA": channel_a,
        "channelB": channel_b,
    })))
}

/// Drain the multipart stream into one buffer per file field, bounding both
/// the number of files and the bytes per file.
async fn collect_files(mut payload: Multipart) -> Result<Vec<Vec<u8>>> {
    let mut files = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        AppError::Validation(format!("Malformed multipart payload: {e}"))
    })? {
        if files.len() >= MAX_UPLOAD_FILES {
            return Err(AppError::Validation(format!(
                "At most {MAX_UPLOAD_FILES} files per upload"
            )));
        }

        if let Some(content_type) = field.content_type() {
            if content_type.type_() != mime::IMAGE {
                return Err(AppError::Validation(format!(
                    "Unsupported content type: {content_type}"
                )));
            }
        }

        let mut buf = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::Validation(format!("Failed to read uploaded file: {e}"))
            })?;
            if buf.len() + chunk.len() > MAX_FILE_BYTES {
                return Err(AppError::Validation(format!(
                    "File exceeds the {MAX_FILE_BYTES} byte limit"
                )));
            }
            buf.extend_from_slice(&chunk);
        }

        if !buf.is_empty() {
            files.push(buf);
        }
    }

    Ok(files)
}
