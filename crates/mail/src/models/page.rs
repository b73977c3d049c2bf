//! Pagination models shared by the list operations

use serde::{Deserialize, Serialize};

/// Parameters for a paged list call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return per page (1-500)
    pub max_results: u32,
    /// Optional Gmail search query (e.g., "in:inbox is:unread")
    pub query: Option<String>,
    /// Page token from a previous response
    pub page_token: Option<String>,
}

impl PageRequest {
    pub fn new(max_results: u32) -> Self {
        Self {
            max_results,
            query: None,
            page_token: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(50)
    }
}

/// One page of results from a list call
///
/// Items appear in the order the remote listing returned their IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// Token for fetching the next page, if there is one
    pub next_page_token: Option<String>,
    /// Server-side estimate of the total result count
    pub result_size_estimate: u32,
    /// The items on this page
    pub items: Vec<T>,
}

impl<T> PageResult<T> {
    /// A page with no items and no continuation
    pub fn empty() -> Self {
        Self {
            next_page_token: None,
            result_size_estimate: 0,
            items: Vec::new(),
        }
    }
}
