use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Postgres, query_builder::QueryBuilder};
use utoipa::IntoParams;

use crate::{error::ApiError, models::Listing};

/// Hard cap on search results. There is no pagination cursor.
pub const MAX_RESULTS: i64 = 10_000;

/// SearchParams
///
/// Query parameters accepted by GET /advertisement. Every field is optional and an
/// empty value counts as absent.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive substring of the description.
    pub description: Option<String>,
    /// Exact price.
    pub price: Option<String>,
    /// Case-insensitive substring of the owner's name.
    pub owner: Option<String>,
    /// `YYYY-MM-DD` for an exact day, anything else is matched as text.
    pub date_posted: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    Description,
    Owner,
}

impl TextField {
    fn column(self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Description => "description",
            TextField::Owner => "owner",
        }
    }

    fn value(self, listing: &Listing) -> &str {
        match self {
            TextField::Title => &listing.title,
            TextField::Description => &listing.description,
            TextField::Owner => &listing.owner,
        }
    }
}

/// One per-field condition of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Contains { field: TextField, needle: String },
    PriceEquals(i64),
    PostedOn(NaiveDate),
    /// Fallback for a `date_posted` value that is not a calendar date.
    PostedTextContains(String),
}

impl Condition {
    fn push_sql(&self, query: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Condition::Contains { field, needle } => {
                query
                    .push(field.column())
                    .push(" ILIKE ")
                    .push_bind(format!("%{needle}%"));
            }
            Condition::PriceEquals(price) => {
                query.push("price = ").push_bind(*price);
            }
            Condition::PostedOn(date) => {
                query
                    .push("(date_posted AT TIME ZONE 'UTC')::date = ")
                    .push_bind(*date);
            }
            Condition::PostedTextContains(needle) => {
                query
                    .push("(date_posted AT TIME ZONE 'UTC')::text ILIKE ")
                    .push_bind(format!("%{needle}%"));
            }
        }
    }

    /// In-memory counterpart of `push_sql`. `ILIKE` wildcards in the needle are
    /// taken literally here.
    fn matches(&self, listing: &Listing) -> bool {
        match self {
            Condition::Contains { field, needle } => contains_ci(field.value(listing), needle),
            Condition::PriceEquals(price) => listing.price == *price,
            Condition::PostedOn(date) => listing.date_posted.date_naive() == *date,
            Condition::PostedTextContains(needle) => {
                contains_ci(&listing.date_posted.naive_utc().to_string(), needle)
            }
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// SearchPlan
///
/// A validated, non-empty set of conditions.
///
/// Conditions are combined with **OR**: a listing matching any single filter is
/// returned, so `title=Car&owner=alice` also finds alice's bike. Existing clients
/// depend on this.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    conditions: Vec<Condition>,
}

impl SearchPlan {
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Appends `(c1 OR c2 OR ...)` to `query`.
    pub fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push("(");
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            condition.push_sql(query);
        }
        query.push(")");
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.conditions.iter().any(|c| c.matches(listing))
    }
}

impl TryFrom<SearchParams> for SearchPlan {
    type Error = ApiError;

    fn try_from(params: SearchParams) -> Result<Self, Self::Error> {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        let mut conditions = Vec::new();

        if let Some(needle) = present(params.title) {
            conditions.push(Condition::Contains {
                field: TextField::Title,
                needle,
            });
        }
        if let Some(needle) = present(params.description) {
            conditions.push(Condition::Contains {
                field: TextField::Description,
                needle,
            });
        }
        if let Some(raw) = present(params.price) {
            let price = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ApiError::Validation(format!("price must be an integer, got {raw:?}")))?;
            conditions.push(Condition::PriceEquals(price));
        }
        if let Some(needle) = present(params.owner) {
            conditions.push(Condition::Contains {
                field: TextField::Owner,
                needle,
            });
        }
        if let Some(raw) = present(params.date_posted) {
            conditions.push(match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Condition::PostedOn(date),
                Err(_) => Condition::PostedTextContains(raw),
            });
        }

        if conditions.is_empty() {
            return Err(ApiError::Validation(
                "At least one search parameter is required".to_string(),
            ));
        }
        Ok(SearchPlan { conditions })
    }
}

/// Builds the plan straight from the query string, so a search without filters is
/// rejected before authentication or any other storage access happens.
impl<S> FromRequestParts<S> for SearchPlan
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<SearchParams>::try_from_uri(&parts.uri)
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        SearchPlan::try_from(params)
    }
}
