use serde::Deserialize;

const MAX_LIMIT: i64 = 100;

/// Offset pagination as accepted on list endpoints: `?limit=20&offset=40`.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 { MAX_LIMIT }

impl PageParams {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Non-positive limits fall back to the maximum page size.
    pub fn limit(&self) -> i64 {
        if self.limit <= 0 {
            MAX_LIMIT
        } else {
            self.limit.min(MAX_LIMIT)
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self { limit: MAX_LIMIT, offset: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limit_and_offset() {
        let p = PageParams::new(500, -3);
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);

        assert_eq!(PageParams::new(0, 10).limit(), 100);
        assert_eq!(PageParams::new(25, 10).limit(), 25);
    }
}
