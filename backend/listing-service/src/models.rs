//! Domain models mapped to the Postgres schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "listing_type", rename_all = "snake_case")]
pub enum ListingType {
    Residential,
    Commercial,
    Land,
    Rural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "listing_status", rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Sold,
    Rented,
}

/// Business-type tag code (many-to-many with listings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "business_code", rename_all = "snake_case")]
pub enum BusinessCode {
    Sale,
    Rent,
    Season,
}

/// A property listing. `deleted_at` is the soft-delete marker: a non-null
/// value removes the row from every default query without destroying it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub listing_type: ListingType,
    pub status: ListingStatus,
    pub price: f64,
    pub rent_price: Option<f64>,
    pub condo_fee: Option<f64>,
    pub total_area: Option<f64>,
    pub built_area: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub parking_spaces: Option<i32>,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub code: String,
    pub user_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded listing image. At most one image per listing carries
/// `is_main = true`; the service enforces this, not the schema.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ListingImage {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub is_main: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Minimal owner projection attached to listing detail responses. Never
/// carries the password hash or refresh token.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OwnerProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

impl From<&User> for OwnerProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// A listing embellished with its images and tag codes, as returned by the
/// list endpoint.
#[derive(Debug, Serialize)]
pub struct ListingWithImages {
    #[serde(flatten)]
    pub listing: Listing,
    pub images: Vec<ListingImage>,
    pub business_types: Vec<BusinessCode>,
}

/// Listing detail: images, owner projection and the routed contact channel.
#[derive(Debug, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub images: Vec<ListingImage>,
    pub business_types: Vec<BusinessCode>,
    pub owner: Option<OwnerProfile>,
    pub contact_channel: String,
}

/// One page of filtered listings plus the echoed pagination bounds.
#[derive(Debug, Serialize)]
pub struct ListingPage {
    pub data: Vec<ListingWithImages>,
    pub total: i64,
    pub skip: i64,
    pub take: i64,
}
