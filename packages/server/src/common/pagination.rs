//! Offset/limit pagination parameters.
//!
//! Audit-log and admin listings page with plain offset/limit; the params
//! are validated once at the boundary and passed down as a value type.

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 25;
const MAX_LIMIT: i64 = 100;

/// Raw pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Apply defaults and clamp to sane bounds.
    pub fn validate(&self) -> Page {
        Page {
            offset: self.offset.unwrap_or(0).max(0),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        PageParams::default().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let page = PageParams::default().validate();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn clamps_limit_and_offset() {
        let page = PageParams {
            offset: Some(-5),
            limit: Some(5000),
        }
        .validate();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, MAX_LIMIT);

        let page = PageParams {
            offset: Some(10),
            limit: Some(0),
        }
        .validate();
        assert_eq!(page.limit, 1);
    }
}
