//! Typeahead suggestions over tags, users, and camera models.
//!
//! The per-category caps (10 tags, 5 users, 5 cameras) and the final
//! truncation to 15 are a UX contract shared with the frontend; changing
//! them silently breaks its layout assumptions.

use std::{collections::HashSet, sync::Arc};

use super::SuggestionResponse;
use crate::{
   error::{GalleryError, Result},
   store::GalleryStore,
   types::Suggestion,
};

pub const TAG_LIMIT: usize = 10;
pub const USER_LIMIT: usize = 5;
pub const CAMERA_LIMIT: usize = 5;
pub const TOTAL_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
   Tags,
   Users,
   Cameras,
}

impl SuggestionKind {
   pub fn parse(value: Option<&str>) -> Result<Option<Self>> {
      match value {
         None => Ok(None),
         Some("tags") => Ok(Some(Self::Tags)),
         Some("users") => Ok(Some(Self::Users)),
         Some("cameras") => Ok(Some(Self::Cameras)),
         Some(other) => Err(GalleryError::validation(format!(
            "unknown suggestion type: {other}"
         ))),
      }
   }
}

pub struct SuggestEngine {
   store: Arc<dyn GalleryStore>,
}

impl SuggestEngine {
   pub fn new(store: Arc<dyn GalleryStore>) -> Self {
      Self { store }
   }

   /// Typeahead lookup (`GET /api/search/suggestions`).
   pub async fn suggest(&self, q: &str, kind: Option<SuggestionKind>) -> Result<SuggestionResponse> {
      let q = q.trim();
      if q.chars().count() < 2 {
         return Err(GalleryError::validation("query must be at least 2 characters"));
      }

      let mut suggestions = Vec::new();

      if matches!(kind, None | Some(SuggestionKind::Tags)) {
         for tag in self.store.suggest_tags(q, TAG_LIMIT).await? {
            suggestions.push(Suggestion::Tag {
               value:   tag.name,
               display: tag.display_name,
               count:   tag.usage_count,
            });
         }
      }

      if matches!(kind, None | Some(SuggestionKind::Users)) {
         for user in self.store.suggest_users(q, USER_LIMIT).await? {
            suggestions.push(Suggestion::User {
               value:   user.id,
               display: user.username,
               avatar:  user.avatar_url,
            });
         }
      }

      if matches!(kind, None | Some(SuggestionKind::Cameras)) {
         // The store hands back raw rows; dedup by "{make} {model}" happens
         // here, after the row cap, matching the reference behavior.
         let mut seen = HashSet::new();
         for (make, model) in self.store.suggest_cameras(q, CAMERA_LIMIT).await? {
            let camera = format!("{make} {model}");
            if seen.insert(camera.clone()) {
               suggestions.push(Suggestion::Camera { value: camera.clone(), display: camera });
            }
         }
      }

      suggestions.truncate(TOTAL_LIMIT);

      Ok(SuggestionResponse { query: q.to_string(), suggestions })
   }
}
