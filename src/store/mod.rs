pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
   error::Result,
   permission::Visibility,
   types::{
      AlbumId, CategoryId, ImageDetail, ImageId, Privacy, Tag, TagId, User, UserId, VectorMatch,
   },
};

/// One predicate of a compiled image query. Clauses combine with AND; the
/// builder constructs the full list up front and hands it over in one piece,
/// so there is no ordering hidden in imperative appends.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
   /// Row-level privacy predicate. Always present, always first.
   Visible(Visibility),
   /// Case-insensitive substring over title, caption, alt text, and tag names.
   TextMatch(String),
   /// Image id allow-list (tag / category / album filters resolve to this).
   IdIn(Vec<ImageId>),
   OwnedBy(UserId),
   PrivacyIs(Privacy),
   /// Case-insensitive substring on camera make.
   CameraMake(String),
   /// Case-insensitive substring on camera model.
   CameraModel(String),
   CreatedAfter(DateTime<Utc>),
   CreatedBefore(DateTime<Utc>),
   License(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
   CreatedAt,
   UpdatedAt,
   Title,
   Views,
}

impl SortField {
   /// Allow-list parse. Unknown fields silently fall back to `created_at`;
   /// callers must never be able to sort by an arbitrary column.
   pub fn parse(value: Option<&str>) -> Self {
      match value {
         Some("updated_at") => Self::UpdatedAt,
         Some("title") => Self::Title,
         Some("views") => Self::Views,
         _ => Self::CreatedAt,
      }
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
   Asc,
   Desc,
}

impl SortOrder {
   pub fn parse(value: Option<&str>) -> Self {
      match value {
         Some("asc") => Self::Asc,
         _ => Self::Desc,
      }
   }
}

/// Compiled, immutable query against the image collection.
#[derive(Debug, Clone)]
pub struct ImageQuery {
   pub clauses: Vec<Clause>,
   pub sort:    SortField,
   pub order:   SortOrder,
   /// 1-based page number.
   pub page:    u32,
   pub limit:   u32,
}

/// External data-store collaborator for images, tags, albums, and users.
/// Assumed concurrent-safe; no locking happens above this seam.
#[async_trait::async_trait]
pub trait GalleryStore: Send + Sync {
   /// Runs a compiled query, returning one page of hydrated images plus the
   /// total row count before pagination.
   async fn list_images(&self, query: &ImageQuery) -> Result<(Vec<ImageDetail>, u64)>;

   async fn get_image(&self, id: ImageId) -> Result<Option<ImageDetail>>;

   /// Increments an image's view counter, returning the new count.
   async fn record_view(&self, id: ImageId) -> Result<u64>;

   /// Resolves normalized tag names to ids. Names without a matching tag are
   /// simply absent from the result.
   async fn resolve_tags(&self, names: &[String]) -> Result<Vec<TagId>>;

   async fn tags_in_category(&self, category: CategoryId) -> Result<Vec<TagId>>;

   /// Images carrying every one of the given tags (intersection).
   async fn images_with_all_tags(&self, tags: &[TagId]) -> Result<Vec<ImageId>>;

   /// Images carrying at least one of the given tags (union).
   async fn images_with_any_tag(&self, tags: &[TagId]) -> Result<Vec<ImageId>>;

   async fn images_in_album(&self, album: AlbumId) -> Result<Vec<ImageId>>;

   /// Nearest-neighbor match over stored embeddings: candidates at or above
   /// `threshold`, ordered by descending similarity, at most `count`.
   async fn match_images(
      &self,
      query: &[f32],
      threshold: f32,
      count: usize,
   ) -> Result<Vec<VectorMatch>>;

   /// Tags whose display name contains `q`, ordered by usage count
   /// descending, at most `limit`.
   async fn suggest_tags(&self, q: &str, limit: usize) -> Result<Vec<Tag>>;

   /// Active users whose username contains `q`, at most `limit`.
   async fn suggest_users(&self, q: &str, limit: usize) -> Result<Vec<User>>;

   /// `(make, model)` pairs from images whose camera fields contain `q`, at
   /// most `limit` rows. Deduplication is the caller's concern.
   async fn suggest_cameras(&self, q: &str, limit: usize) -> Result<Vec<(String, String)>>;
}

#[async_trait::async_trait]
impl<T: GalleryStore + ?Sized> GalleryStore for Arc<T> {
   async fn list_images(&self, query: &ImageQuery) -> Result<(Vec<ImageDetail>, u64)> {
      (**self).list_images(query).await
   }

   async fn get_image(&self, id: ImageId) -> Result<Option<ImageDetail>> {
      (**self).get_image(id).await
   }

   async fn record_view(&self, id: ImageId) -> Result<u64> {
      (**self).record_view(id).await
   }

   async fn resolve_tags(&self, names: &[String]) -> Result<Vec<TagId>> {
      (**self).resolve_tags(names).await
   }

   async fn tags_in_category(&self, category: CategoryId) -> Result<Vec<TagId>> {
      (**self).tags_in_category(category).await
   }

   async fn images_with_all_tags(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
      (**self).images_with_all_tags(tags).await
   }

   async fn images_with_any_tag(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
      (**self).images_with_any_tag(tags).await
   }

   async fn images_in_album(&self, album: AlbumId) -> Result<Vec<ImageId>> {
      (**self).images_in_album(album).await
   }

   async fn match_images(
      &self,
      query: &[f32],
      threshold: f32,
      count: usize,
   ) -> Result<Vec<VectorMatch>> {
      (**self).match_images(query, threshold, count).await
   }

   async fn suggest_tags(&self, q: &str, limit: usize) -> Result<Vec<Tag>> {
      (**self).suggest_tags(q, limit).await
   }

   async fn suggest_users(&self, q: &str, limit: usize) -> Result<Vec<User>> {
      (**self).suggest_users(q, limit).await
   }

   async fn suggest_cameras(&self, q: &str, limit: usize) -> Result<Vec<(String, String)>> {
      (**self).suggest_cameras(q, limit).await
   }
}

pub use memory::MemoryStore;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_sort_field_allow_list() {
      assert_eq!(SortField::parse(Some("created_at")), SortField::CreatedAt);
      assert_eq!(SortField::parse(Some("updated_at")), SortField::UpdatedAt);
      assert_eq!(SortField::parse(Some("title")), SortField::Title);
      assert_eq!(SortField::parse(Some("views")), SortField::Views);
      // Anything off the allow-list falls back, never errors.
      assert_eq!(SortField::parse(Some("owner")), SortField::CreatedAt);
      assert_eq!(SortField::parse(Some("'; drop table")), SortField::CreatedAt);
      assert_eq!(SortField::parse(None), SortField::CreatedAt);
   }

   #[test]
   fn test_sort_order_defaults_desc() {
      assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
      assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
      assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Desc);
      assert_eq!(SortOrder::parse(None), SortOrder::Desc);
   }
}
