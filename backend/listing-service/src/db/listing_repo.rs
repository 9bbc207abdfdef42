/// Listing repository - handles all database operations for listings
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::filters::{Clause, QueryPredicate};
use crate::models::{BusinessCode, Listing, ListingStatus, ListingType};

const LISTING_COLUMNS: &str = "id, title, description, listing_type, status, price, rent_price, \
     condo_fee, total_area, built_area, bedrooms, bathrooms, parking_spaces, \
     state, city, neighborhood, code, user_id, deleted_at, created_at, updated_at";

/// Field set for inserting a new listing row.
#[derive(Debug, Clone)]
pub struct NewListing {
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
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ListingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub listing_type: Option<ListingType>,
    pub status: Option<ListingStatus>,
    pub price: Option<f64>,
    pub rent_price: Option<f64>,
    pub condo_fee: Option<f64>,
    pub total_area: Option<f64>,
    pub built_area: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub parking_spaces: Option<i32>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
}

pub async fn insert(pool: &PgPool, new: &NewListing) -> Result<Listing, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query_as::<_, Listing>(&format!(
        r#"
        INSERT INTO listings
            (id, title, description, listing_type, status, price, rent_price,
             condo_fee, total_area, built_area, bedrooms, bathrooms, parking_spaces,
             state, city, neighborhood, code, user_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        RETURNING {LISTING_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.listing_type)
    .bind(new.status)
    .bind(new.price)
    .bind(new.rent_price)
    .bind(new.condo_fee)
    .bind(new.total_area)
    .bind(new.built_area)
    .bind(new.bedrooms)
    .bind(new.bathrooms)
    .bind(new.parking_spaces)
    .bind(&new.state)
    .bind(&new.city)
    .bind(&new.neighborhood)
    .bind(&new.code)
    .bind(new.user_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Find a listing by ID. Soft-deleted rows are hidden unless
/// `include_deleted` is set; only image cleanup paths set it.
pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
    include_deleted: bool,
) -> Result<Option<Listing>, sqlx::Error> {
    let guard = if include_deleted {
        ""
    } else {
        " AND deleted_at IS NULL"
    };

    sqlx::query_as::<_, Listing>(&format!(
        r#"
        SELECT {LISTING_COLUMNS}
        FROM listings
        WHERE id = $1{guard}
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Apply a partial update. Returns `None` when the listing does not exist or
/// is soft-deleted.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: &ListingChanges,
) -> Result<Option<Listing>, sqlx::Error> {
    let now = Utc::now();

    sqlx::query_as::<_, Listing>(&format!(
        r#"
        UPDATE listings
        SET title = COALESCE($1, title),
            description = COALESCE($2, description),
            listing_type = COALESCE($3, listing_type),
            status = COALESCE($4, status),
            price = COALESCE($5, price),
            rent_price = COALESCE($6, rent_price),
            condo_fee = COALESCE($7, condo_fee),
            total_area = COALESCE($8, total_area),
            built_area = COALESCE($9, built_area),
            bedrooms = COALESCE($10, bedrooms),
            bathrooms = COALESCE($11, bathrooms),
            parking_spaces = COALESCE($12, parking_spaces),
            state = COALESCE($13, state),
            city = COALESCE($14, city),
            neighborhood = COALESCE($15, neighborhood),
            updated_at = $16
        WHERE id = $17 AND deleted_at IS NULL
        RETURNING {LISTING_COLUMNS}
        "#
    ))
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.listing_type)
    .bind(changes.status)
    .bind(changes.price)
    .bind(changes.rent_price)
    .bind(changes.condo_fee)
    .bind(changes.total_area)
    .bind(changes.built_area)
    .bind(changes.bedrooms)
    .bind(changes.bathrooms)
    .bind(changes.parking_spaces)
    .bind(&changes.state)
    .bind(&changes.city)
    .bind(&changes.neighborhood)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Soft-delete a listing. Returns false when it was already deleted or
/// never existed.
pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE listings
        SET deleted_at = $1, updated_at = $1
        WHERE id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch one page of listings matched by the predicate, newest first.
pub async fn list(
    pool: &PgPool,
    predicate: &QueryPredicate,
    skip: i64,
    take: i64,
) -> Result<Vec<Listing>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {LISTING_COLUMNS} FROM listings"
    ));
    push_predicate(&mut builder, predicate);
    builder.push(" ORDER BY created_at DESC");
    builder.push(" LIMIT ").push_bind(take);
    builder.push(" OFFSET ").push_bind(skip);

    builder.build_query_as::<Listing>().fetch_all(pool).await
}

/// Count listings matched by the predicate, ignoring pagination.
pub async fn count(pool: &PgPool, predicate: &QueryPredicate) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM listings");
    push_predicate(&mut builder, predicate);

    let (total,): (i64,) = builder.build_query_as().fetch_one(pool).await?;
    Ok(total)
}

/// Replace the business-type tags attached to a listing.
pub async fn replace_business_types(
    pool: &PgPool,
    listing_id: Uuid,
    codes: &[BusinessCode],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM listing_business_types WHERE listing_id = $1")
        .bind(listing_id)
        .execute(&mut *tx)
        .await?;

    for code in codes {
        sqlx::query(
            r#"
            INSERT INTO listing_business_types (listing_id, business_type_id)
            SELECT $1, id FROM business_types WHERE code = $2
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(listing_id)
        .bind(code)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Fetch the tag codes for a batch of listings as (listing_id, code) pairs.
pub async fn business_types_for(
    pool: &PgPool,
    listing_ids: &[Uuid],
) -> Result<Vec<(Uuid, BusinessCode)>, sqlx::Error> {
    if listing_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, (Uuid, BusinessCode)>(
        r#"
        SELECT lbt.listing_id, bt.code
        FROM listing_business_types lbt
        JOIN business_types bt ON bt.id = lbt.business_type_id
        WHERE lbt.listing_id = ANY($1)
        "#,
    )
    .bind(listing_ids)
    .fetch_all(pool)
    .await
}

/// Render predicate clauses into a WHERE fragment with bound parameters.
/// Substring values are bound, never interpolated; LIKE metacharacters in
/// user input are escaped so they match literally.
fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &QueryPredicate) {
    if predicate.clauses.is_empty() {
        return;
    }

    builder.push(" WHERE ");
    for (i, clause) in predicate.clauses.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        match clause {
            Clause::NotDeleted => {
                builder.push("deleted_at IS NULL");
            }
            Clause::TypeEquals(listing_type) => {
                builder.push("listing_type = ").push_bind(*listing_type);
            }
            Clause::StatusEquals(status) => {
                builder.push("status = ").push_bind(*status);
            }
            Clause::Contains { field, value } => {
                builder
                    .push(field.column())
                    .push(" ILIKE ")
                    .push_bind(like_pattern(value));
            }
            Clause::SearchOr(term) => {
                let pattern = like_pattern(term);
                builder
                    .push("(title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Clause::Range { field, min, max } => {
                let column = field.column();
                if let Some(min) = min {
                    builder.push(column).push(" >= ").push_bind(*min);
                }
                if min.is_some() && max.is_some() {
                    builder.push(" AND ");
                }
                if let Some(max) = max {
                    builder.push(column).push(" <= ").push_bind(*max);
                }
            }
            Clause::HasBusinessType(code) => {
                builder
                    .push(
                        "EXISTS (SELECT 1 FROM listing_business_types lbt \
                         JOIN business_types bt ON bt.id = lbt.business_type_id \
                         WHERE lbt.listing_id = listings.id AND bt.code = ",
                    )
                    .push_bind(*code)
                    .push(")");
            }
        }
    }
}

fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{RangeField, TextField};

    fn render(clauses: Vec<Clause>) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM listings");
        push_predicate(&mut builder, &QueryPredicate { clauses });
        builder.sql().to_string()
    }

    #[test]
    fn test_empty_predicate_renders_no_where() {
        assert_eq!(render(vec![]), "SELECT id FROM listings");
    }

    #[test]
    fn test_not_deleted_guard() {
        assert_eq!(
            render(vec![Clause::NotDeleted]),
            "SELECT id FROM listings WHERE deleted_at IS NULL"
        );
    }

    #[test]
    fn test_clauses_join_with_and() {
        let sql = render(vec![
            Clause::NotDeleted,
            Clause::TypeEquals(ListingType::Residential),
            Clause::StatusEquals(ListingStatus::Available),
        ]);
        assert_eq!(
            sql,
            "SELECT id FROM listings WHERE deleted_at IS NULL \
             AND listing_type = $1 AND status = $2"
        );
    }

    #[test]
    fn test_contains_binds_pattern() {
        let sql = render(vec![Clause::Contains {
            field: TextField::City,
            value: "Lisbon".to_string(),
        }]);
        assert_eq!(sql, "SELECT id FROM listings WHERE city ILIKE $1");
    }

    #[test]
    fn test_search_or_spans_title_and_description() {
        let sql = render(vec![Clause::SearchOr("garden".to_string())]);
        assert_eq!(
            sql,
            "SELECT id FROM listings WHERE (title ILIKE $1 OR description ILIKE $2)"
        );
    }

    #[test]
    fn test_range_renders_present_bounds_only() {
        let both = render(vec![Clause::Range {
            field: RangeField::Price,
            min: Some(100.0),
            max: Some(500.0),
        }]);
        assert_eq!(
            both,
            "SELECT id FROM listings WHERE price >= $1 AND price <= $2"
        );

        let min_only = render(vec![Clause::Range {
            field: RangeField::Bedrooms,
            min: Some(2.0),
            max: None,
        }]);
        assert_eq!(min_only, "SELECT id FROM listings WHERE bedrooms >= $1");
    }

    #[test]
    fn test_business_type_uses_exists_subquery() {
        let sql = render(vec![Clause::HasBusinessType(BusinessCode::Rent)]);
        assert!(sql.contains("EXISTS (SELECT 1 FROM listing_business_types"));
        assert!(sql.ends_with("bt.code = $1)"));
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
