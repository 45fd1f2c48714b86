//! In-memory gallery store seeded from a JSON snapshot.
//!
//! Stands in for the hosted Postgres/storage collaborator: filtered listing,
//! association lookups, and the `match_images` nearest-neighbor operation
//! (brute-force cosine over stored embeddings).

use std::{collections::HashMap, path::Path};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Clause, GalleryStore, ImageQuery, SortField, SortOrder};
use crate::{
   error::{GalleryError, Result},
   permission::Visibility,
   types::{
      Album, AlbumId, Category, CategoryId, Image, ImageDetail, ImageId, Privacy, Tag, TagId,
      TagRef, User, UserId, VectorMatch,
   },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTagLink {
   pub image_id: ImageId,
   pub tag_id:   TagId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumImageLink {
   pub album_id: AlbumId,
   pub image_id: ImageId,
}

/// On-disk snapshot shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
   #[serde(default)]
   pub users:        Vec<User>,
   #[serde(default)]
   pub images:       Vec<Image>,
   #[serde(default)]
   pub tags:         Vec<Tag>,
   #[serde(default)]
   pub categories:   Vec<Category>,
   #[serde(default)]
   pub albums:       Vec<Album>,
   #[serde(default)]
   pub image_tags:   Vec<ImageTagLink>,
   #[serde(default)]
   pub album_images: Vec<AlbumImageLink>,
}

#[derive(Default)]
struct GalleryData {
   users:        HashMap<UserId, User>,
   images:       HashMap<ImageId, Image>,
   tags:         HashMap<TagId, Tag>,
   categories:   HashMap<CategoryId, Category>,
   albums:       HashMap<AlbumId, Album>,
   image_tags:   HashMap<ImageId, Vec<TagId>>,
   album_images: HashMap<AlbumId, Vec<ImageId>>,
}

pub struct MemoryStore {
   data: RwLock<GalleryData>,
}

impl Default for MemoryStore {
   fn default() -> Self {
      Self::new()
   }
}

impl MemoryStore {
   pub fn new() -> Self {
      Self { data: RwLock::new(GalleryData::default()) }
   }

   pub fn from_snapshot(snapshot: Snapshot) -> Self {
      let store = Self::new();
      {
         let mut data = store.data.write();
         for user in snapshot.users {
            data.users.insert(user.id, user);
         }
         for image in snapshot.images {
            data.images.insert(image.id, image);
         }
         for tag in snapshot.tags {
            data.tags.insert(tag.id, tag);
         }
         for category in snapshot.categories {
            data.categories.insert(category.id, category);
         }
         for album in snapshot.albums {
            data.albums.insert(album.id, album);
         }
         for link in snapshot.image_tags {
            data
               .image_tags
               .entry(link.image_id)
               .or_default()
               .push(link.tag_id);
         }
         for link in snapshot.album_images {
            data
               .album_images
               .entry(link.album_id)
               .or_default()
               .push(link.image_id);
         }
      }
      store
   }

   pub fn load(path: &Path) -> Result<Self> {
      let raw = std::fs::read_to_string(path)?;
      let snapshot: Snapshot = serde_json::from_str(&raw)?;
      Ok(Self::from_snapshot(snapshot))
   }

   pub fn insert_user(&self, user: User) {
      self.data.write().users.insert(user.id, user);
   }

   pub fn insert_image(&self, image: Image) {
      self.data.write().images.insert(image.id, image);
   }

   pub fn insert_tag(&self, tag: Tag) {
      self.data.write().tags.insert(tag.id, tag);
   }

   pub fn insert_category(&self, category: Category) {
      self.data.write().categories.insert(category.id, category);
   }

   pub fn insert_album(&self, album: Album) {
      self.data.write().albums.insert(album.id, album);
   }

   pub fn tag_image(&self, image: ImageId, tag: TagId) {
      let mut data = self.data.write();
      data.image_tags.entry(image).or_default().push(tag);
      if let Some(t) = data.tags.get_mut(&tag) {
         t.usage_count += 1;
      }
   }

   pub fn add_to_album(&self, album: AlbumId, image: ImageId) {
      self
         .data
         .write()
         .album_images
         .entry(album)
         .or_default()
         .push(image);
   }

   pub fn image_count(&self) -> usize {
      self.data.read().images.len()
   }
}

/// ASCII-only case fold: non-ASCII characters in the needle match only
/// with exact casing, same as the backing store's `ilike` on C locale.
fn contains_ci(haystack: &str, needle: &str) -> bool {
   if needle.is_empty() {
      return true;
   }
   haystack
      .as_bytes()
      .windows(needle.len())
      .any(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
   if a.len() != b.len() || a.is_empty() {
      return None;
   }
   let mut dot = 0.0f32;
   let mut norm_a = 0.0f32;
   let mut norm_b = 0.0f32;
   for (x, y) in a.iter().zip(b) {
      dot += x * y;
      norm_a += x * x;
      norm_b += y * y;
   }
   if norm_a == 0.0 || norm_b == 0.0 {
      return None;
   }
   Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

impl GalleryData {
   fn visible(&self, image: &Image, scope: Visibility) -> bool {
      match scope {
         Visibility::All => true,
         Visibility::PublicOnly => image.privacy == Privacy::Public,
         Visibility::VisibleTo { viewer, include_unlisted } => {
            image.privacy == Privacy::Public
               || (include_unlisted && image.privacy == Privacy::Unlisted)
               || image.owner == viewer
         },
      }
   }

   fn text_matches(&self, image: &Image, needle: &str) -> bool {
      if contains_ci(&image.title, needle)
         || contains_ci(&image.caption, needle)
         || contains_ci(&image.alt_text, needle)
      {
         return true;
      }
      self
         .image_tags
         .get(&image.id)
         .is_some_and(|tag_ids| {
            tag_ids.iter().any(|id| {
               self.tags.get(id).is_some_and(|tag| {
                  contains_ci(&tag.name, needle) || contains_ci(&tag.display_name, needle)
               })
            })
         })
   }

   fn matches(&self, image: &Image, clause: &Clause) -> bool {
      match clause {
         Clause::Visible(scope) => self.visible(image, *scope),
         Clause::TextMatch(needle) => self.text_matches(image, needle),
         Clause::IdIn(ids) => ids.contains(&image.id),
         Clause::OwnedBy(user) => image.owner == *user,
         Clause::PrivacyIs(privacy) => image.privacy == *privacy,
         Clause::CameraMake(needle) => image
            .camera_make
            .as_deref()
            .is_some_and(|make| contains_ci(make, needle)),
         Clause::CameraModel(needle) => image
            .camera_model
            .as_deref()
            .is_some_and(|model| contains_ci(model, needle)),
         Clause::CreatedAfter(ts) => image.created_at >= *ts,
         Clause::CreatedBefore(ts) => image.created_at <= *ts,
         Clause::License(license) => image.license.as_deref() == Some(license.as_str()),
      }
   }

   fn hydrate(&self, image: &Image) -> Result<ImageDetail> {
      let owner = self
         .users
         .get(&image.owner)
         .ok_or_else(|| GalleryError::upstream("owner record missing for image"))?;

      let tags = self
         .image_tags
         .get(&image.id)
         .map(|ids| {
            ids.iter()
               .filter_map(|id| self.tags.get(id))
               .map(|tag| TagRef {
                  id:           tag.id,
                  name:         tag.name.clone(),
                  display_name: tag.display_name.clone(),
               })
               .collect()
         })
         .unwrap_or_default();

      Ok(ImageDetail { image: image.clone(), owner: owner.summary(), tags })
   }
}

#[async_trait::async_trait]
impl GalleryStore for MemoryStore {
   async fn list_images(&self, query: &ImageQuery) -> Result<(Vec<ImageDetail>, u64)> {
      let data = self.data.read();

      let mut rows: Vec<&Image> = data
         .images
         .values()
         .filter(|image| query.clauses.iter().all(|clause| data.matches(image, clause)))
         .collect();

      // Id tie-break keeps repeated identical queries byte-identical.
      rows.sort_by(|a, b| {
         let ordering = match query.sort {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Views => a.views.cmp(&b.views),
         };
         let ordering = match query.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
         };
         ordering.then_with(|| a.id.cmp(&b.id))
      });

      let total = rows.len() as u64;
      let offset = (query.page.saturating_sub(1) as usize) * query.limit as usize;
      let page = rows
         .into_iter()
         .skip(offset)
         .take(query.limit as usize)
         .map(|image| data.hydrate(image))
         .collect::<Result<Vec<_>>>()?;

      Ok((page, total))
   }

   async fn get_image(&self, id: ImageId) -> Result<Option<ImageDetail>> {
      let data = self.data.read();
      match data.images.get(&id) {
         Some(image) => Ok(Some(data.hydrate(image)?)),
         None => Ok(None),
      }
   }

   async fn record_view(&self, id: ImageId) -> Result<u64> {
      let mut data = self.data.write();
      let image = data
         .images
         .get_mut(&id)
         .ok_or(GalleryError::NotFound("image"))?;
      image.views += 1;
      Ok(image.views)
   }

   async fn resolve_tags(&self, names: &[String]) -> Result<Vec<TagId>> {
      let data = self.data.read();
      Ok(names
         .iter()
         .filter_map(|name| {
            data
               .tags
               .values()
               .find(|tag| tag.name == *name)
               .map(|tag| tag.id)
         })
         .collect())
   }

   async fn tags_in_category(&self, category: CategoryId) -> Result<Vec<TagId>> {
      let data = self.data.read();
      let mut ids: Vec<TagId> = data
         .tags
         .values()
         .filter(|tag| tag.category_id == Some(category))
         .map(|tag| tag.id)
         .collect();
      ids.sort_unstable();
      Ok(ids)
   }

   async fn images_with_all_tags(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
      if tags.is_empty() {
         return Ok(Vec::new());
      }
      let data = self.data.read();
      let mut ids: Vec<ImageId> = data
         .image_tags
         .iter()
         .filter(|(_, attached)| tags.iter().all(|tag| attached.contains(tag)))
         .map(|(image, _)| *image)
         .collect();
      ids.sort_unstable();
      Ok(ids)
   }

   async fn images_with_any_tag(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
      let data = self.data.read();
      let mut ids: Vec<ImageId> = data
         .image_tags
         .iter()
         .filter(|(_, attached)| tags.iter().any(|tag| attached.contains(tag)))
         .map(|(image, _)| *image)
         .collect();
      ids.sort_unstable();
      Ok(ids)
   }

   async fn images_in_album(&self, album: AlbumId) -> Result<Vec<ImageId>> {
      let data = self.data.read();
      Ok(data.album_images.get(&album).cloned().unwrap_or_default())
   }

   async fn match_images(
      &self,
      query: &[f32],
      threshold: f32,
      count: usize,
   ) -> Result<Vec<VectorMatch>> {
      let data = self.data.read();
      let mut matches: Vec<VectorMatch> = data
         .images
         .values()
         .filter_map(|image| {
            let embedding = image.embedding.as_deref()?;
            let similarity = cosine_similarity(query, embedding)?;
            (similarity >= threshold).then_some(VectorMatch { id: image.id, similarity })
         })
         .collect();

      matches.sort_by(|a, b| {
         b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
      });
      matches.truncate(count);
      Ok(matches)
   }

   async fn suggest_tags(&self, q: &str, limit: usize) -> Result<Vec<Tag>> {
      let data = self.data.read();
      let mut tags: Vec<Tag> = data
         .tags
         .values()
         .filter(|tag| contains_ci(&tag.display_name, q))
         .cloned()
         .collect();
      tags.sort_by(|a, b| {
         b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| a.name.cmp(&b.name))
      });
      tags.truncate(limit);
      Ok(tags)
   }

   async fn suggest_users(&self, q: &str, limit: usize) -> Result<Vec<User>> {
      let data = self.data.read();
      let mut users: Vec<User> = data
         .users
         .values()
         .filter(|user| user.is_active && contains_ci(&user.username, q))
         .cloned()
         .collect();
      users.sort_by(|a, b| a.username.cmp(&b.username));
      users.truncate(limit);
      Ok(users)
   }

   async fn suggest_cameras(&self, q: &str, limit: usize) -> Result<Vec<(String, String)>> {
      let data = self.data.read();
      let mut rows: Vec<(&Image, (String, String))> = data
         .images
         .values()
         .filter_map(|image| {
            let make = image.camera_make.as_deref()?;
            let model = image.camera_model.as_deref()?;
            (contains_ci(make, q) || contains_ci(model, q))
               .then(|| (image, (make.to_string(), model.to_string())))
         })
         .collect();
      rows.sort_by(|a, b| {
         b.0
            .created_at
            .cmp(&a.0.created_at)
            .then_with(|| a.0.id.cmp(&b.0.id))
      });
      Ok(rows.into_iter().take(limit).map(|(_, pair)| pair).collect())
   }
}
