//! Filter compilation for listing queries.
//!
//! `compile` turns the flat set of optional query parameters into an explicit
//! list of predicate clauses. The clauses are storage-agnostic; the listing
//! repository translates them into SQL. Each clause ANDs with the others, and
//! the soft-delete guard is always present and never overridable.

use serde::Deserialize;
use validator::Validate;

use crate::models::{BusinessCode, ListingStatus, ListingType};

pub const DEFAULT_SKIP: i64 = 0;
pub const DEFAULT_TAKE: i64 = 10;
pub const MAX_TAKE: i64 = 100;

/// Optional search/pagination parameters for listing queries, as supplied in
/// the query string.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub status: Option<ListingStatus>,
    pub business_type: Option<BusinessCode>,

    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub state: Option<String>,

    /// Free-text search across title and description.
    pub search: Option<String>,

    #[validate(range(min = 0.0))]
    pub min_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_price: Option<f64>,

    #[validate(range(min = 0.0))]
    pub min_total_area: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_total_area: Option<f64>,

    #[validate(range(min = 0.0))]
    pub min_built_area: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_built_area: Option<f64>,

    #[validate(range(min = 0))]
    pub min_bedrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub max_bedrooms: Option<i32>,

    #[validate(range(min = 0))]
    pub min_bathrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub max_bathrooms: Option<i32>,

    #[validate(range(min = 0))]
    pub min_parking_spaces: Option<i32>,
    #[validate(range(min = 0))]
    pub max_parking_spaces: Option<i32>,

    #[validate(range(min = 0))]
    pub skip: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub take: Option<i64>,
}

/// Text columns that accept case-insensitive substring matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    City,
    Neighborhood,
    State,
}

impl TextField {
    pub fn column(&self) -> &'static str {
        match self {
            TextField::City => "city",
            TextField::Neighborhood => "neighborhood",
            TextField::State => "state",
        }
    }
}

/// Numeric columns that accept inclusive range bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeField {
    Price,
    TotalArea,
    BuiltArea,
    Bedrooms,
    Bathrooms,
    ParkingSpaces,
}

impl RangeField {
    pub fn column(&self) -> &'static str {
        match self {
            RangeField::Price => "price",
            RangeField::TotalArea => "total_area",
            RangeField::BuiltArea => "built_area",
            RangeField::Bedrooms => "bedrooms",
            RangeField::Bathrooms => "bathrooms",
            RangeField::ParkingSpaces => "parking_spaces",
        }
    }
}

/// One predicate clause. Clauses combine with logical AND; `SearchOr` is a
/// single AND-ed clause whose two substring checks OR internally.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    NotDeleted,
    TypeEquals(ListingType),
    StatusEquals(ListingStatus),
    Contains { field: TextField, value: String },
    SearchOr(String),
    Range {
        field: RangeField,
        min: Option<f64>,
        max: Option<f64>,
    },
    HasBusinessType(BusinessCode),
}

/// The compiled predicate. Pagination is deliberately not part of it; the
/// caller clamps and applies skip/take separately.
#[derive(Debug, Clone)]
pub struct QueryPredicate {
    pub clauses: Vec<Clause>,
}

/// Clamp pagination to the documented bounds before compilation.
pub fn clamp_pagination(skip: Option<i64>, take: Option<i64>) -> (i64, i64) {
    let skip = skip.unwrap_or(DEFAULT_SKIP).max(0);
    let take = take.unwrap_or(DEFAULT_TAKE).clamp(1, MAX_TAKE);
    (skip, take)
}

/// Compile a filter into predicate clauses. Pure: no side effects, no clock.
pub fn compile(filter: &ListingFilter) -> QueryPredicate {
    let mut clauses = vec![Clause::NotDeleted];

    if let Some(listing_type) = filter.listing_type {
        clauses.push(Clause::TypeEquals(listing_type));
    }
    if let Some(status) = filter.status {
        clauses.push(Clause::StatusEquals(status));
    }

    push_contains(&mut clauses, TextField::City, filter.city.as_deref());
    push_contains(
        &mut clauses,
        TextField::Neighborhood,
        filter.neighborhood.as_deref(),
    );
    push_contains(&mut clauses, TextField::State, filter.state.as_deref());

    if let Some(search) = filter.search.as_deref() {
        if !search.is_empty() {
            clauses.push(Clause::SearchOr(search.to_string()));
        }
    }

    push_range(&mut clauses, RangeField::Price, filter.min_price, filter.max_price);
    push_range(
        &mut clauses,
        RangeField::TotalArea,
        filter.min_total_area,
        filter.max_total_area,
    );
    push_range(
        &mut clauses,
        RangeField::BuiltArea,
        filter.min_built_area,
        filter.max_built_area,
    );
    push_range(
        &mut clauses,
        RangeField::Bedrooms,
        filter.min_bedrooms.map(f64::from),
        filter.max_bedrooms.map(f64::from),
    );
    push_range(
        &mut clauses,
        RangeField::Bathrooms,
        filter.min_bathrooms.map(f64::from),
        filter.max_bathrooms.map(f64::from),
    );
    push_range(
        &mut clauses,
        RangeField::ParkingSpaces,
        filter.min_parking_spaces.map(f64::from),
        filter.max_parking_spaces.map(f64::from),
    );

    if let Some(code) = filter.business_type {
        clauses.push(Clause::HasBusinessType(code));
    }

    QueryPredicate { clauses }
}

fn push_contains(clauses: &mut Vec<Clause>, field: TextField, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() {
            clauses.push(Clause::Contains {
                field,
                value: value.to_string(),
            });
        }
    }
}

/// A range clause is emitted only when at least one bound is present; an
/// absent bound stays unconstrained rather than defaulting to 0 or infinity.
fn push_range(clauses: &mut Vec<Clause>, field: RangeField, min: Option<f64>, max: Option<f64>) {
    if min.is_some() || max.is_some() {
        clauses.push(Clause::Range { field, min, max });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_compiles_to_soft_delete_guard_only() {
        let predicate = compile(&ListingFilter::default());
        assert_eq!(predicate.clauses, vec![Clause::NotDeleted]);
    }

    #[test]
    fn soft_delete_guard_is_always_first() {
        let filter = ListingFilter {
            status: Some(ListingStatus::Available),
            ..Default::default()
        };
        let predicate = compile(&filter);
        assert_eq!(predicate.clauses[0], Clause::NotDeleted);
        assert_eq!(predicate.clauses.len(), 2);
    }

    #[test]
    fn price_range_keeps_only_supplied_bounds() {
        let filter = ListingFilter {
            min_price: Some(100.0),
            max_price: Some(500.0),
            ..Default::default()
        };
        let predicate = compile(&filter);
        assert!(predicate.clauses.contains(&Clause::Range {
            field: RangeField::Price,
            min: Some(100.0),
            max: Some(500.0),
        }));

        let open_ended = compile(&ListingFilter {
            min_price: Some(100.0),
            ..Default::default()
        });
        assert!(open_ended.clauses.contains(&Clause::Range {
            field: RangeField::Price,
            min: Some(100.0),
            max: None,
        }));
    }

    #[test]
    fn absent_range_emits_no_clause() {
        let predicate = compile(&ListingFilter::default());
        assert!(!predicate
            .clauses
            .iter()
            .any(|c| matches!(c, Clause::Range { .. })));
    }

    #[test]
    fn search_becomes_a_single_or_clause() {
        let filter = ListingFilter {
            search: Some("loft".to_string()),
            ..Default::default()
        };
        let predicate = compile(&filter);
        assert!(predicate
            .clauses
            .contains(&Clause::SearchOr("loft".to_string())));
    }

    #[test]
    fn text_filters_become_contains_clauses() {
        let filter = ListingFilter {
            city: Some("Recife".to_string()),
            neighborhood: Some("Boa Viagem".to_string()),
            ..Default::default()
        };
        let predicate = compile(&filter);
        assert!(predicate.clauses.contains(&Clause::Contains {
            field: TextField::City,
            value: "Recife".to_string(),
        }));
        assert!(predicate.clauses.contains(&Clause::Contains {
            field: TextField::Neighborhood,
            value: "Boa Viagem".to_string(),
        }));
    }

    #[test]
    fn business_type_becomes_relational_clause() {
        let filter = ListingFilter {
            business_type: Some(BusinessCode::Rent),
            ..Default::default()
        };
        let predicate = compile(&filter);
        assert!(predicate
            .clauses
            .contains(&Clause::HasBusinessType(BusinessCode::Rent)));
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(clamp_pagination(None, None), (0, 10));
        assert_eq!(clamp_pagination(Some(-5), Some(0)), (0, 1));
        assert_eq!(clamp_pagination(Some(20), Some(500)), (20, 100));
        assert_eq!(clamp_pagination(Some(3), Some(25)), (3, 25));
    }
}
