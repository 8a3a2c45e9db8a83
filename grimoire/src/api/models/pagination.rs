//! `skip`/`limit` paging for the list endpoints.

use crate::db::handlers::repository::OwnerFilter;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Query parameters of a list request. Missing or out-of-range values are clamped, never rejected.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub skip: Option<i64>,

    /// Page size (default: 20, max: 100)
    #[param(default = 20, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// The repository filter for this page
    pub fn filter(&self) -> OwnerFilter {
        OwnerFilter::new(
            self.skip.map_or(0, |skip| skip.max(0)),
            self.limit.map_or(DEFAULT_LIMIT, |limit| limit.clamp(1, MAX_LIMIT)),
        )
    }
}

/// One page of a list, with the total so clients can render page controls.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub items: Vec<T>,
    /// Every item the caller owns, not only this page
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn page(items: Vec<T>, total_count: i64, filter: &OwnerFilter) -> Self {
        Self {
            items,
            total_count,
            skip: filter.skip,
            limit: filter.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_for(query: &str) -> OwnerFilter {
        serde_urlencoded::from_str::<Pagination>(query).unwrap().filter()
    }

    #[test]
    fn test_missing_params_use_defaults() {
        let filter = Pagination::default().filter();
        assert_eq!((filter.skip, filter.limit), (0, DEFAULT_LIMIT));
    }

    #[test]
    fn test_out_of_range_params_are_clamped() {
        let filter = filter_for("skip=-5&limit=1000");
        assert_eq!((filter.skip, filter.limit), (0, MAX_LIMIT));

        assert_eq!(filter_for("limit=0").limit, 1);
        assert_eq!(filter_for("skip=40&limit=10").skip, 40);
    }

    #[test]
    fn test_page_echoes_filter() {
        let page = PaginatedResponse::page(vec![1_i32, 2], 12, &OwnerFilter::new(10, 2));
        assert_eq!((page.skip, page.limit, page.total_count), (10, 2, 12));
    }
}
