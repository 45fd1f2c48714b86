//! Search engines and the response contract they share.
//!
//! Both retrieval paths (relational filtering and vector similarity) shape
//! their output through the types here, so callers see one stable contract
//! no matter which engine produced the page.

pub mod filter;
pub mod suggest;
pub mod vector;

pub use filter::FilterEngine;
use serde::{Deserialize, Serialize};
pub use suggest::{SuggestEngine, SuggestionKind};
pub use vector::VectorEngine;

use crate::types::{CategoryId, ImageDetail, ScoredImage, Suggestion, UserId, VectorQueryKind};

/// Page size cap for `/api/search`.
pub const SEARCH_LIMIT_MAX: u32 = 100;
/// Page size cap for `/api/images`. The list endpoint is cheaper to abuse
/// for scraping, so it caps lower than full search.
pub const LIST_LIMIT_MAX: u32 = 50;
pub const DEFAULT_LIMIT: u32 = 20;

pub const VECTOR_LIMIT_MAX: u32 = 50;
pub const VECTOR_LIMIT_DEFAULT: u32 = 12;

pub fn clamp_page(page: Option<u32>) -> u32 {
   page.unwrap_or(1).max(1)
}

pub fn clamp_limit(limit: Option<u32>, max: u32) -> u32 {
   limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
   pub page:        u32,
   pub limit:       u32,
   pub total:       u64,
   pub total_pages: u64,
   pub has_next:    bool,
   pub has_prev:    bool,
}

impl Pagination {
   pub fn new(page: u32, limit: u32, total: u64) -> Self {
      let total_pages = total.div_ceil(u64::from(limit));
      Self {
         page,
         limit,
         total,
         total_pages,
         has_next: u64::from(page) < total_pages,
         has_prev: page > 1,
      }
   }

   pub fn empty(page: u32, limit: u32) -> Self {
      Self::new(page, limit, 0)
   }
}

/// Echo of the filters a search was run with, returned alongside results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterEcho {
   pub query:        Option<String>,
   pub tags:         Option<Vec<String>>,
   pub category_id:  Option<CategoryId>,
   pub user_id:      Option<UserId>,
   pub album_id:     Option<crate::types::AlbumId>,
   pub camera_make:  Option<String>,
   pub camera_model: Option<String>,
   pub date_from:    Option<String>,
   pub date_to:      Option<String>,
   pub license:      Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
   pub results:    Vec<ImageDetail>,
   pub pagination: Pagination,
   pub filters:    FilterEcho,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListResponse {
   pub images:     Vec<ImageDetail>,
   pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResponse {
   pub results:       Vec<ScoredImage>,
   pub search_type:   VectorQueryKind,
   pub query:         String,
   pub total_matches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
   pub query:       String,
   pub suggestions: Vec<Suggestion>,
}
