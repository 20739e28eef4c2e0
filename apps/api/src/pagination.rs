use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// `?limit=&offset=` query parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let page = Page::default();
        assert_eq!((page.limit(), page.offset()), (20, 0));

        let page = Page {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!((page.limit(), page.offset()), (100, 0));

        let page = Page {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!((page.limit(), page.offset()), (1, 40));
    }
}
