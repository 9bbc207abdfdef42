/// Image repository - handles all database operations for listing images
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ListingImage;

const IMAGE_COLUMNS: &str = "id, listing_id, url, is_main, created_at";

/// Insert a batch of image rows in one transaction. Either every row lands
/// or none do.
pub async fn insert_batch(
    pool: &PgPool,
    listing_id: Uuid,
    urls: &[String],
) -> Result<Vec<ListingImage>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let mut images = Vec::with_capacity(urls.len());

    for url in urls {
        let image = sqlx::query_as::<_, ListingImage>(&format!(
            r#"
            INSERT INTO listing_images (id, listing_id, url, is_main, created_at)
            VALUES ($1, $2, $3, false, $4)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(url)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        images.push(image);
    }

    tx.commit().await?;
    Ok(images)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ListingImage>, sqlx::Error> {
    sqlx::query_as::<_, ListingImage>(&format!(
        r#"
        SELECT {IMAGE_COLUMNS}
        FROM listing_images
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// All images for one listing, main image first.
pub async fn list_for_listing(
    pool: &PgPool,
    listing_id: Uuid,
) -> Result<Vec<ListingImage>, sqlx::Error> {
    sqlx::query_as::<_, ListingImage>(&format!(
        r#"
        SELECT {IMAGE_COLUMNS}
        FROM listing_images
        WHERE listing_id = $1
        ORDER BY is_main DESC, created_at ASC
        "#
    ))
    .bind(listing_id)
    .fetch_all(pool)
    .await
}

/// All images for a batch of listings; the caller groups them by listing.
pub async fn list_for_listings(
    pool: &PgPool,
    listing_ids: &[Uuid],
) -> Result<Vec<ListingImage>, sqlx::Error> {
    if listing_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, ListingImage>(&format!(
        r#"
        SELECT {IMAGE_COLUMNS}
        FROM listing_images
        WHERE listing_id = ANY($1)
        ORDER BY is_main DESC, created_at ASC
        "#
    ))
    .bind(listing_ids)
    .fetch_all(pool)
    .await
}

/// Delete one image row. Returns false when the row was already gone.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM listing_images WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Promote one image to main within a transaction: demote every image of
/// the listing, then flag the chosen one. Returns false when the image does
/// not belong to the listing.
pub async fn set_main(
    pool: &PgPool,
    listing_id: Uuid,
    image_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE listing_images SET is_main = false WHERE listing_id = $1")
        .bind(listing_id)
        .execute(&mut *tx)
        .await?;

    let promoted = sqlx::query(
        "UPDATE listing_images SET is_main = true WHERE id = $1 AND listing_id = $2",
    )
    .bind(image_id)
    .bind(listing_id)
    .execute(&mut *tx)
    .await?;

    if promoted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}
