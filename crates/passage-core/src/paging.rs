//! Paged results from the directory API.

/// One page of a paginated directory query.
///
/// Iteration is driven by the caller: feed `next_page_token` back into the
/// next call to continue. The sequence is restartable from any token; there
/// is no open server-side cursor.
#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Token for fetching the next page, absent on the final page.
    pub next_page_token: Option<String>,
}

impl<T> PagedResult<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// Whether another page exists.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_page_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_requires_non_empty_token() {
        assert!(!PagedResult::<u8>::new(vec![], None).has_more());
        assert!(!PagedResult::<u8>::new(vec![], Some(String::new())).has_more());
        assert!(PagedResult::<u8>::new(vec![], Some("tok".into())).has_more());
    }
}
