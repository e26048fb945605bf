//! Query Builder LIMIT, OFFSET and UNION operations

use super::builder::Query;
use super::types::Union;

impl Query {
    /// Add LIMIT clause; negative values are ignored
    pub fn limit(mut self, count: i64) -> Self {
        if count >= 0 {
            if self.unions.is_empty() {
                self.limit = Some(count);
            } else {
                self.union_limit = Some(count);
            }
        }
        self
    }

    /// Alias of [`Query::limit`]
    pub fn take(self, count: i64) -> Self {
        self.limit(count)
    }

    /// Add OFFSET clause; negative values clamp to zero
    pub fn offset(mut self, count: i64) -> Self {
        let count = count.max(0);
        if self.unions.is_empty() {
            self.offset = Some(count);
        } else {
            self.union_offset = Some(count);
        }
        self
    }

    /// Alias of [`Query::offset`]
    pub fn skip(self, count: i64) -> Self {
        self.offset(count)
    }

    /// Add pagination (LIMIT + OFFSET) for a 1-based page
    pub fn for_page(self, page: i64, per_page: i64) -> Self {
        let page = page.max(1);
        self.offset((page - 1).saturating_mul(per_page)).limit(per_page)
    }

    /// Append a UNION
    pub fn union(mut self, query: Query) -> Self {
        self.unions.push(Union {
            query: Box::new(query),
            all: false,
        });
        self
    }

    /// Append a UNION ALL
    pub fn union_all(mut self, query: Query) -> Self {
        self.unions.push(Union {
            query: Box::new(query),
            all: true,
        });
        self
    }
}
