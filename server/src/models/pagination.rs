use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset fits in an `i64` at any page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Limit/offset paging. `page` is 1-indexed; 0 means the first page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub page: i64,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        if self.limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        }
    }

    pub fn offset(&self) -> i64 {
        if self.page <= 1 {
            0
        } else {
            (self.page - 1).saturating_mul(self.limit())
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.limit < 0 || self.page < 0 {
            return Err(AppError::ValidationError(
                "pagination values must not be negative".into(),
            ));
        }
        if self.page > MAX_PAGE {
            return Err(AppError::ValidationError(format!(
                "page must not exceed {MAX_PAGE}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_first_page_of_ten() {
        let p = Pagination::default();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_huge_page_is_rejected_without_overflow() {
        let p = Pagination {
            limit: 10,
            page: i64::MAX,
        };
        assert!(matches!(p.validate(), Err(AppError::ValidationError(_))));
        assert_eq!(p.offset(), i64::MAX);

        let p = Pagination {
            limit: 0,
            page: MAX_PAGE,
        };
        assert!(p.validate().is_ok());
        assert!(p.offset() > 0);
    }

    #[test]
    fn test_offset_uses_effective_limit() {
        let p = Pagination { limit: 0, page: 3 };
        assert_eq!(p.offset(), 20);

        let p = Pagination { limit: 5, page: 2 };
        assert_eq!(p.offset(), 5);
    }

    #[test]
    fn test_limit_is_capped() {
        let p = Pagination { limit: 10_000, page: 1 };
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
    }
}
