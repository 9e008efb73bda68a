//! Ways to filter posts based on their fields. Filter semantics work just like SQL:
//! If a field is unset, its filter won't be applied.
//! If set, filter out posts that don't match the filter.
#[cfg(test)]
use crate::datastore::structs::Post;

/// Filters that can be applied to post queries on the datastore.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct PostFilters {
    pub text_contains: Option<String>,
    pub user_id: Option<i32>,
    pub page: Page,
}

impl PostFilters {
    #[cfg(test)]
    /// Does this post match all specified filters? Pagination isn't a per-post property, so it's
    /// ignored here.
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(user_id) = self.user_id {
            if user_id != post.user_id {
                return false;
            }
        }
        if let Some(substring) = &self.text_contains {
            if !post.body.contains(substring.as_str()) {
                return false;
            }
        }
        true
    }
}

/// One page of a newest-first listing. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Page {
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(number: u32, per_page: u32) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.max(1))
    }

    #[cfg(test)]
    /// Apply this page to an already sorted in-memory listing.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset() as usize)
            .take(self.limit() as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 25)
    }
}
