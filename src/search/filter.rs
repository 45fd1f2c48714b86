//! Relational filter search over the image collection.
//!
//! Translates a sparse filter set into one compiled clause list. The
//! visibility clause always goes in first and no parameter can widen it.
//! Tag, category, and album filters resolve to image-id allow-lists before
//! the query runs; when any of them resolves to nothing the whole search
//! short-circuits to an empty page instead of dropping the filter.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use super::{
   FilterEcho, ImageListResponse, LIST_LIMIT_MAX, Pagination, SEARCH_LIMIT_MAX, SearchResponse,
   clamp_limit, clamp_page,
};
use crate::{
   error::{GalleryError, Result},
   permission,
   store::{Clause, GalleryStore, ImageQuery, SortField, SortOrder},
   types::{ImageDetail, ImageId, ListQuery, Principal, Privacy, SearchQuery},
};

pub struct FilterEngine {
   store: Arc<dyn GalleryStore>,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
   Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
   let last_second = NaiveTime::from_hms_opt(23, 59, 59).expect("valid constant time");
   Utc.from_utc_datetime(&date.and_time(last_second))
}

fn echo(query: &SearchQuery) -> FilterEcho {
   FilterEcho {
      query:        query.q.clone(),
      tags:         query.tags.clone(),
      category_id:  query.category_id,
      user_id:      query.user_id,
      album_id:     query.album_id,
      camera_make:  query.camera_make.clone(),
      camera_model: query.camera_model.clone(),
      date_from:    query.date_from.map(|d| d.format("%Y-%m-%d").to_string()),
      date_to:      query.date_to.map(|d| d.format("%Y-%m-%d").to_string()),
      license:      query.license.clone(),
   }
}

impl FilterEngine {
   pub fn new(store: Arc<dyn GalleryStore>) -> Self {
      Self { store }
   }

   /// Full filter search (`GET /api/search`).
   pub async fn search(
      &self,
      principal: Option<&Principal>,
      query: &SearchQuery,
   ) -> Result<SearchResponse> {
      let page = clamp_page(query.page);
      let limit = clamp_limit(query.limit, SEARCH_LIMIT_MAX);

      let empty = || SearchResponse {
         results:    Vec::new(),
         pagination: Pagination::empty(page, limit),
         filters:    echo(query),
      };

      let mut clauses = vec![Clause::Visible(permission::view_scope(principal))];

      if let Some(names) = &query.tags {
         let normalized: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
         if !normalized.is_empty() {
            let tag_ids = self.store.resolve_tags(&normalized).await?;
            // AND semantics: a name matching no tag means no image can carry
            // every listed tag.
            if tag_ids.len() != normalized.len() {
               return Ok(empty());
            }
            let image_ids = self.store.images_with_all_tags(&tag_ids).await?;
            if image_ids.is_empty() {
               return Ok(empty());
            }
            clauses.push(Clause::IdIn(image_ids));
         }
      }

      if let Some(category) = query.category_id {
         let tag_ids = self.store.tags_in_category(category).await?;
         if tag_ids.is_empty() {
            return Ok(empty());
         }
         let image_ids = self.store.images_with_any_tag(&tag_ids).await?;
         if image_ids.is_empty() {
            return Ok(empty());
         }
         clauses.push(Clause::IdIn(image_ids));
      }

      if let Some(album) = query.album_id {
         let image_ids = self.store.images_in_album(album).await?;
         if image_ids.is_empty() {
            return Ok(empty());
         }
         clauses.push(Clause::IdIn(image_ids));
      }

      if let Some(q) = query.q.as_deref() {
         let trimmed = q.trim();
         if !trimmed.is_empty() {
            clauses.push(Clause::TextMatch(trimmed.to_string()));
         }
      }

      if let Some(user) = query.user_id {
         clauses.push(Clause::OwnedBy(user));
      }

      if let Some(make) = query.camera_make.as_deref() {
         let trimmed = make.trim();
         if !trimmed.is_empty() {
            clauses.push(Clause::CameraMake(trimmed.to_string()));
         }
      }

      if let Some(model) = query.camera_model.as_deref() {
         let trimmed = model.trim();
         if !trimmed.is_empty() {
            clauses.push(Clause::CameraModel(trimmed.to_string()));
         }
      }

      if let Some(from) = query.date_from {
         clauses.push(Clause::CreatedAfter(start_of_day(from)));
      }

      if let Some(to) = query.date_to {
         clauses.push(Clause::CreatedBefore(end_of_day(to)));
      }

      if let Some(license) = query.license.as_deref() {
         clauses.push(Clause::License(license.to_string()));
      }

      let compiled = ImageQuery {
         clauses,
         sort: SortField::parse(query.sort_by.as_deref()),
         order: SortOrder::parse(query.sort_order.as_deref()),
         page,
         limit,
      };

      let (results, total) = self.store.list_images(&compiled).await?;

      Ok(SearchResponse {
         results,
         pagination: Pagination::new(page, limit, total),
         filters: echo(query),
      })
   }

   /// Image listing (`GET /api/images`).
   pub async fn list(
      &self,
      principal: Option<&Principal>,
      query: &ListQuery,
   ) -> Result<ImageListResponse> {
      let page = clamp_page(query.page);
      let limit = clamp_limit(query.limit, LIST_LIMIT_MAX);

      let mut clauses = vec![Clause::Visible(permission::view_scope(principal))];

      if let Some(raw) = query.privacy.as_deref() {
         let privacy = Privacy::parse(raw)
            .ok_or_else(|| GalleryError::validation(format!("invalid privacy value: {raw}")))?;
         // Narrows visibility, never widens it: the scope clause above still
         // applies, so e.g. anonymous + privacy=private yields nothing.
         clauses.push(Clause::PrivacyIs(privacy));
      }

      if let Some(user) = query.user_id {
         clauses.push(Clause::OwnedBy(user));
      }

      let compiled = ImageQuery {
         clauses,
         sort: SortField::parse(query.sort_by.as_deref()),
         order: SortOrder::parse(query.sort_order.as_deref()),
         page,
         limit,
      };

      let (images, total) = self.store.list_images(&compiled).await?;

      Ok(ImageListResponse { images, pagination: Pagination::new(page, limit, total) })
   }

   /// Single fetch (`GET /api/images/:id`). Absent rows are 404; existing
   /// rows the principal may not see are 403 - the distinction is
   /// deliberate and load-bearing for clients.
   pub async fn get_image(
      &self,
      principal: Option<&Principal>,
      id: ImageId,
   ) -> Result<ImageDetail> {
      let mut detail = self
         .store
         .get_image(id)
         .await?
         .ok_or(GalleryError::NotFound("image"))?;

      if !permission::can_view(principal, &detail.image) {
         return Err(GalleryError::forbidden());
      }

      // Owners browsing their own uploads do not inflate the counter.
      let is_owner = principal.is_some_and(|p| p.id == detail.image.owner);
      if !is_owner {
         detail.image.views = self.store.record_view(id).await?;
      }

      Ok(detail)
   }
}

#[cfg(test)]
mod tests {
   use chrono::{TimeZone, Utc};
   use uuid::Uuid;

   use super::*;
   use crate::{
      store::MemoryStore,
      types::{Image, Role, Tag, User},
   };

   fn store_with_owner() -> (Arc<MemoryStore>, Principal) {
      let store = Arc::new(MemoryStore::new());
      let owner = Principal { id: Uuid::new_v4(), role: Role::Editor };
      store.insert_user(User {
         id:         owner.id,
         username:   "ansel".to_string(),
         avatar_url: None,
         is_active:  true,
      });
      (store, owner)
   }

   fn image(owner: &Principal, title: &str, privacy: Privacy, day: u32) -> Image {
      Image {
         id: Uuid::new_v4(),
         owner: owner.id,
         privacy,
         title: title.to_string(),
         caption: String::new(),
         alt_text: String::new(),
         camera_make: None,
         camera_model: None,
         license: None,
         created_at: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
         updated_at: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
         views: 0,
         embedding: None,
      }
   }

   fn engine(store: &Arc<MemoryStore>) -> FilterEngine {
      FilterEngine::new(Arc::clone(store) as Arc<dyn GalleryStore>)
   }

   #[tokio::test]
   async fn test_anonymous_sees_only_public() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "pub", Privacy::Public, 1));
      store.insert_image(image(&owner, "unl", Privacy::Unlisted, 2));
      store.insert_image(image(&owner, "prv", Privacy::Private, 3));

      let response = engine(&store)
         .search(None, &SearchQuery::default())
         .await
         .unwrap();
      assert_eq!(response.pagination.total, 1);
      assert_eq!(response.results[0].image.title, "pub");
   }

   #[tokio::test]
   async fn test_owner_sees_own_private_in_search() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "prv", Privacy::Private, 1));

      let response = engine(&store)
         .search(Some(&owner), &SearchQuery::default())
         .await
         .unwrap();
      assert_eq!(response.pagination.total, 1);
   }

   #[tokio::test]
   async fn test_unknown_tag_short_circuits_empty() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "pub", Privacy::Public, 1));

      let query = SearchQuery {
         tags: Some(vec!["nope".to_string()]),
         ..Default::default()
      };
      let response = engine(&store).search(None, &query).await.unwrap();
      assert!(response.results.is_empty());
      assert_eq!(response.pagination.total, 0);
      assert_eq!(response.pagination.total_pages, 0);
   }

   #[tokio::test]
   async fn test_tag_and_semantics() {
      let (store, owner) = store_with_owner();
      let both = image(&owner, "both", Privacy::Public, 1);
      let one = image(&owner, "one", Privacy::Public, 2);
      let (both_id, one_id) = (both.id, one.id);
      store.insert_image(both);
      store.insert_image(one);

      let mountain = Tag {
         id:           Uuid::new_v4(),
         name:         "mountain".to_string(),
         display_name: "Mountain".to_string(),
         category_id:  None,
         usage_count:  0,
      };
      let snow = Tag {
         id:           Uuid::new_v4(),
         name:         "snow".to_string(),
         display_name: "Snow".to_string(),
         category_id:  None,
         usage_count:  0,
      };
      let (m_id, s_id) = (mountain.id, snow.id);
      store.insert_tag(mountain);
      store.insert_tag(snow);
      store.tag_image(both_id, m_id);
      store.tag_image(both_id, s_id);
      store.tag_image(one_id, m_id);

      let query = SearchQuery {
         // Mixed case on purpose: names are normalized before resolution.
         tags: Some(vec!["Mountain".to_string(), "SNOW".to_string()]),
         ..Default::default()
      };
      let response = engine(&store).search(None, &query).await.unwrap();
      assert_eq!(response.pagination.total, 1);
      assert_eq!(response.results[0].image.id, both_id);
   }

   #[tokio::test]
   async fn test_empty_category_short_circuits() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "pub", Privacy::Public, 1));

      let query = SearchQuery {
         category_id: Some(Uuid::new_v4()),
         ..Default::default()
      };
      let response = engine(&store).search(None, &query).await.unwrap();
      assert_eq!(response.pagination.total, 0);
   }

   #[tokio::test]
   async fn test_date_range_is_inclusive_end_of_day() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "inside", Privacy::Public, 10));
      store.insert_image(image(&owner, "after", Privacy::Public, 11));

      let query = SearchQuery {
         date_from: Some(chrono::NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()),
         date_to: Some(chrono::NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()),
         ..Default::default()
      };
      let response = engine(&store).search(None, &query).await.unwrap();
      assert_eq!(response.pagination.total, 1);
      assert_eq!(response.results[0].image.title, "inside");
   }

   #[tokio::test]
   async fn test_unknown_sort_field_falls_back_to_created_at_desc() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "older", Privacy::Public, 1));
      store.insert_image(image(&owner, "newer", Privacy::Public, 2));

      let query = SearchQuery {
         sort_by: Some("unknown_field".to_string()),
         ..Default::default()
      };
      let response = engine(&store).search(None, &query).await.unwrap();
      assert_eq!(response.results[0].image.title, "newer");
      assert_eq!(response.results[1].image.title, "older");
   }

   #[tokio::test]
   async fn test_search_is_idempotent() {
      let (store, owner) = store_with_owner();
      for day in 1..=4 {
         store.insert_image(image(&owner, "shot", Privacy::Public, day));
      }

      let eng = engine(&store);
      let first = eng.search(None, &SearchQuery::default()).await.unwrap();
      let second = eng.search(None, &SearchQuery::default()).await.unwrap();
      let ids = |r: &SearchResponse| {
         r.results
            .iter()
            .map(|d| d.image.id)
            .collect::<Vec<_>>()
      };
      assert_eq!(ids(&first), ids(&second));
   }

   #[tokio::test]
   async fn test_list_rejects_invalid_privacy_value() {
      let (store, _) = store_with_owner();
      let query = ListQuery {
         privacy: Some("secret".to_string()),
         ..Default::default()
      };
      let err = engine(&store).list(None, &query).await.unwrap_err();
      assert_eq!(err.status(), 400);
   }

   #[tokio::test]
   async fn test_list_privacy_param_cannot_widen_scope() {
      let (store, owner) = store_with_owner();
      store.insert_image(image(&owner, "prv", Privacy::Private, 1));

      let query = ListQuery {
         privacy: Some("private".to_string()),
         ..Default::default()
      };
      let response = engine(&store).list(None, &query).await.unwrap();
      assert_eq!(response.pagination.total, 0);
   }

   #[tokio::test]
   async fn test_get_image_absent_is_not_found() {
      let (store, _) = store_with_owner();
      let err = engine(&store)
         .get_image(None, Uuid::new_v4())
         .await
         .unwrap_err();
      assert_eq!(err.status(), 404);
   }

   #[tokio::test]
   async fn test_get_image_forbidden_for_non_owner() {
      let (store, owner) = store_with_owner();
      let img = image(&owner, "prv", Privacy::Private, 1);
      let id = img.id;
      store.insert_image(img);

      let stranger = Principal { id: Uuid::new_v4(), role: Role::Visitor };
      let err = engine(&store)
         .get_image(Some(&stranger), id)
         .await
         .unwrap_err();
      assert_eq!(err.status(), 403);

      // The owner gets the image back.
      let detail = engine(&store).get_image(Some(&owner), id).await.unwrap();
      assert_eq!(detail.image.id, id);
   }

   #[tokio::test]
   async fn test_view_count_increments_only_for_non_owners() {
      let (store, owner) = store_with_owner();
      let img = image(&owner, "pub", Privacy::Public, 1);
      let id = img.id;
      store.insert_image(img);
      let eng = engine(&store);

      let own_view = eng.get_image(Some(&owner), id).await.unwrap();
      assert_eq!(own_view.image.views, 0);

      let anon_view = eng.get_image(None, id).await.unwrap();
      assert_eq!(anon_view.image.views, 1);

      let visitor = Principal { id: Uuid::new_v4(), role: Role::Visitor };
      let visitor_view = eng.get_image(Some(&visitor), id).await.unwrap();
      assert_eq!(visitor_view.image.views, 2);
   }
}
