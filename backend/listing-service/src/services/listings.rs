/// Listing orchestration: CRUD, filtered search, image lifecycle.
use std::collections::HashMap;

use futures::future::join_all;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::db::{image_repo, listing_repo, user_repo};
use crate::db::listing_repo::{ListingChanges, NewListing};
use crate::error::{AppError, Result};
use crate::filters::{self, ListingFilter};
use crate::models::{
    BusinessCode, Listing, ListingDetail, ListingImage, ListingPage, ListingWithImages,
    OwnerProfile,
};
use crate::services::image_processing;
use crate::AppState;

pub async fn create(
    state: &AppState,
    new: NewListing,
    business_types: Vec<BusinessCode>,
) -> Result<ListingWithImages> {
    let listing = listing_repo::insert(&state.db, &new).await?;

    if !business_types.is_empty() {
        listing_repo::replace_business_types(&state.db, listing.id, &business_types).await?;
    }

    tracing::info!(listing_id = %listing.id, code = %listing.code, "listing created");

    Ok(ListingWithImages {
        listing,
        images: Vec::new(),
        business_types,
    })
}

/// One page of listings matching the filter, with images and tags attached
/// in two batch queries rather than per row.
pub async fn list(state: &AppState, filter: &ListingFilter) -> Result<ListingPage> {
    let (skip, take) = filters::clamp_pagination(filter.skip, filter.take);
    let predicate = filters::compile(filter);

    let total = listing_repo::count(&state.db, &predicate).await?;
    let listings = listing_repo::list(&state.db, &predicate, skip, take).await?;

    let ids: Vec<Uuid> = listings.iter().map(|l| l.id).collect();
    let mut images = group_images(image_repo::list_for_listings(&state.db, &ids).await?);
    let mut tags = group_tags(listing_repo::business_types_for(&state.db, &ids).await?);

    let data = listings
        .into_iter()
        .map(|listing| {
            let id = listing.id;
            ListingWithImages {
                listing,
                images: images.remove(&id).unwrap_or_default(),
                business_types: tags.remove(&id).unwrap_or_default(),
            }
        })
        .collect();

    Ok(ListingPage {
        data,
        total,
        skip,
        take,
    })
}

/// Listing detail with owner projection and the routed contact channel.
/// Soft-deleted listings are not found here.
pub async fn get(state: &AppState, id: Uuid) -> Result<ListingDetail> {
    let listing = find_active(state, id).await?;

    let images = image_repo::list_for_listing(&state.db, id).await?;
    let business_types = group_tags(listing_repo::business_types_for(&state.db, &[id]).await?)
        .remove(&id)
        .unwrap_or_default();
    let owner = user_repo::find_by_id(&state.db, listing.user_id)
        .await?
        .as_ref()
        .map(OwnerProfile::from);
    let contact_channel = state.contacts.route(&listing.id.to_string()).to_string();

    Ok(ListingDetail {
        listing,
        images,
        business_types,
        owner,
        contact_channel,
    })
}

pub async fn update(
    state: &AppState,
    id: Uuid,
    changes: ListingChanges,
    business_types: Option<Vec<BusinessCode>>,
) -> Result<ListingWithImages> {
    let listing = listing_repo::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    if let Some(codes) = &business_types {
        listing_repo::replace_business_types(&state.db, id, codes).await?;
    }

    let images = image_repo::list_for_listing(&state.db, id).await?;
    let business_types = group_tags(listing_repo::business_types_for(&state.db, &[id]).await?)
        .remove(&id)
        .unwrap_or_default();

    Ok(ListingWithImages {
        listing,
        images,
        business_types,
    })
}

/// Soft-delete a listing. Cloud image deletion is best-effort: a storage
/// failure is logged and swallowed, the listing still goes away.
pub async fn remove(state: &AppState, id: Uuid) -> Result<()> {
    find_active(state, id).await?;
    let images = image_repo::list_for_listing(&state.db, id).await?;

    if !listing_repo::soft_delete(&state.db, id).await? {
        return Err(AppError::NotFound("Listing not found".to_string()));
    }

    for image in &images {
        delete_stored_object(state, &image.url).await;
    }

    tracing::info!(listing_id = %id, images = images.len(), "listing removed");
    Ok(())
}

/// Process and store a batch of uploaded photos. All-or-nothing: when any
/// upload fails, already-uploaded objects are removed best-effort and no
/// rows are written.
pub async fn upload_images(
    state: &AppState,
    listing_id: Uuid,
    files: Vec<Vec<u8>>,
) -> Result<Vec<ListingImage>> {
    if files.is_empty() {
        return Err(AppError::Validation("No image files provided".to_string()));
    }
    find_active(state, listing_id).await?;

    let mut payloads = Vec::with_capacity(files.len());
    for file in files {
        payloads.push(image_processing::transcode(file).await?);
    }

    let uploads = payloads.into_iter().map(|payload| {
        let key = image_key(listing_id);
        async move {
            let url = state.storage.upload(&key, payload, "image/jpeg").await?;
            Ok::<_, AppError>(url)
        }
    });
    let results: Vec<std::result::Result<String, AppError>> = join_all(uploads).await;

    let mut urls = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(url) => urls.push(url),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(_) => {}
        }
    }

    if let Some(err) = first_error {
        for url in &urls {
            delete_stored_object(state, url).await;
        }
        return Err(err);
    }
    let images = image_repo::insert_batch(&state.db, listing_id, &urls).await?;

    tracing::info!(listing_id = %listing_id, count = images.len(), "images uploaded");
    Ok(images)
}

/// Delete one image. The cloud object delete is best-effort; the row delete
/// is not.
pub async fn delete_image(state: &AppState, image_id: Uuid) -> Result<()> {
    let image = image_repo::find_by_id(&state.db, image_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    // The owning listing must resolve too; soft-deleted listings still own
    // their images, so the deleted guard is lifted here.
    listing_repo::find_by_id(&state.db, image.listing_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    delete_stored_object(state, &image.url).await;

    if !image_repo::delete(&state.db, image_id).await? {
        return Err(AppError::NotFound("Image not found".to_string()));
    }
    Ok(())
}

pub async fn set_main_image(state: &AppState, listing_id: Uuid, image_id: Uuid) -> Result<()> {
    find_active(state, listing_id).await?;

    if !image_repo::set_main(&state.db, listing_id, image_id).await? {
        return Err(AppError::NotFound(
            "Image not found for this listing".to_string(),
        ));
    }
    Ok(())
}

async fn find_active(state: &AppState, id: Uuid) -> Result<Listing> {
    listing_repo::find_by_id(&state.db, id, false)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
}

async fn delete_stored_object(state: &AppState, url: &str) {
    let Some(key) = state.storage.key_from_url(url) else {
        tracing::warn!(url = %url, "could not derive storage key from image url");
        return;
    };
    if let Err(err) = state.storage.delete(&key).await {
        tracing::warn!(key = %key, error = %err, "cloud image delete failed");
    }
}

/// Collision-resistant object name scoped to the listing.
fn image_key(listing_id: Uuid) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "{listing_id}-{}-{suffix}.jpg",
        chrono::Utc::now().timestamp_millis()
    )
}

fn group_images(rows: Vec<ListingImage>) -> HashMap<Uuid, Vec<ListingImage>> {
    let mut grouped: HashMap<Uuid, Vec<ListingImage>> = HashMap::new();
    for image in rows {
        grouped.entry(image.listing_id).or_default().push(image);
    }
    grouped
}

fn group_tags(rows: Vec<(Uuid, BusinessCode)>) -> HashMap<Uuid, Vec<BusinessCode>> {
    let mut grouped: HashMap<Uuid, Vec<BusinessCode>> = HashMap::new();
    for (listing_id, code) in rows {
        grouped.entry(listing_id).or_default().push(code);
    }
    grouped
}
