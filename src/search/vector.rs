//! Similarity search: embedding -> nearest-neighbor match -> permission
//! pruning.
//!
//! Candidates a principal may not see are dropped, never replaced; the
//! result can legitimately come back shorter than the requested limit.
//! The embed and match calls are the only externally-variable-latency
//! steps, so each runs under its own timeout budget and surfaces a
//! retryable error instead of hanging the request.

use std::{sync::Arc, time::Duration};

use super::{VECTOR_LIMIT_DEFAULT, VECTOR_LIMIT_MAX, VectorSearchResponse};
use crate::{
   config::Config,
   embed::EmbeddingProvider,
   error::{GalleryError, Result},
   permission,
   store::GalleryStore,
   types::{Principal, ScoredImage, VectorQuery, VectorQueryKind},
};

pub struct VectorEngine {
   store:         Arc<dyn GalleryStore>,
   embedder:      Arc<dyn EmbeddingProvider>,
   threshold:     f32,
   embed_timeout: Duration,
   match_timeout: Duration,
}

async fn bounded<T>(
   budget: Duration,
   what: &str,
   fut: impl Future<Output = Result<T>>,
) -> Result<T> {
   match tokio::time::timeout(budget, fut).await {
      Ok(result) => result,
      Err(_) => Err(GalleryError::Timeout(what.to_string())),
   }
}

impl VectorEngine {
   pub fn new(
      store: Arc<dyn GalleryStore>,
      embedder: Arc<dyn EmbeddingProvider>,
      cfg: &Config,
   ) -> Self {
      Self {
         store,
         embedder,
         threshold: cfg.similarity_threshold,
         embed_timeout: cfg.embed_timeout(),
         match_timeout: cfg.match_timeout(),
      }
   }

   /// Similarity search (`POST /api/search/vector`).
   pub async fn search(
      &self,
      principal: Option<&Principal>,
      query: &VectorQuery,
   ) -> Result<VectorSearchResponse> {
      let limit = query
         .limit
         .unwrap_or(VECTOR_LIMIT_DEFAULT)
         .clamp(1, VECTOR_LIMIT_MAX) as usize;

      let (vector, query_echo) = match query.kind {
         VectorQueryKind::Text => {
            let text = query
               .text
               .as_deref()
               .map(str::trim)
               .filter(|t| !t.is_empty())
               .ok_or_else(|| GalleryError::validation("text query is missing"))?;
            let vector = bounded(
               self.embed_timeout,
               "embedding provider",
               self.embedder.embed_text(text),
            )
            .await?;
            (vector, text.to_string())
         },
         VectorQueryKind::Image => {
            let bytes = query
               .image
               .as_deref()
               .filter(|b| !b.is_empty())
               .ok_or_else(|| GalleryError::validation("image payload is missing"))?;
            if !self.embedder.supports_image_embedding() {
               return Err(GalleryError::Unsupported(
                  "image embedding is not available with the configured provider".to_string(),
               ));
            }
            let vector = bounded(
               self.embed_timeout,
               "embedding provider",
               self.embedder.embed_image(bytes),
            )
            .await?;
            (vector, "image_upload".to_string())
         },
      };

      let candidates = bounded(
         self.match_timeout,
         "similarity matcher",
         self.store.match_images(&vector, self.threshold, limit),
      )
      .await?;

      // Candidates are hydrated one at a time and pruned in place, which
      // preserves their relative similarity order. No backfill: a pruned
      // candidate is not replaced from a further matcher page.
      let mut results = Vec::with_capacity(candidates.len());
      for candidate in candidates {
         let Some(detail) = self.store.get_image(candidate.id).await? else {
            continue;
         };
         if permission::can_view(principal, &detail.image) {
            results.push(ScoredImage { detail, similarity: candidate.similarity });
         }
      }

      let total_matches = results.len();
      Ok(VectorSearchResponse {
         results,
         search_type: query.kind,
         query: query_echo,
         total_matches,
      })
   }
}

#[cfg(test)]
mod tests {
   use chrono::{TimeZone, Utc};
   use uuid::Uuid;

   use super::*;
   use crate::{
      store::{ImageQuery, MemoryStore},
      types::{
         AlbumId, CategoryId, Image, ImageDetail, ImageId, Privacy, Role, Tag, TagId, User,
         VectorMatch,
      },
   };

   struct StubEmbedder {
      vector: Vec<f32>,
      images: bool,
   }

   #[async_trait::async_trait]
   impl EmbeddingProvider for StubEmbedder {
      async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
         Ok(self.vector.clone())
      }

      async fn embed_image(&self, _bytes: &[u8]) -> Result<Vec<f32>> {
         if self.images {
            Ok(self.vector.clone())
         } else {
            Err(GalleryError::Unsupported("no image model".to_string()))
         }
      }

      fn supports_image_embedding(&self) -> bool {
         self.images
      }

      fn dimension(&self) -> usize {
         self.vector.len()
      }
   }

   struct SlowEmbedder;

   #[async_trait::async_trait]
   impl EmbeddingProvider for SlowEmbedder {
      async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
         tokio::time::sleep(Duration::from_secs(3600)).await;
         Ok(vec![1.0, 0.0, 0.0])
      }

      async fn embed_image(&self, _bytes: &[u8]) -> Result<Vec<f32>> {
         Err(GalleryError::Unsupported("no image model".to_string()))
      }

      fn supports_image_embedding(&self) -> bool {
         false
      }

      fn dimension(&self) -> usize {
         3
      }
   }

   /// Delegates everything except `match_images`, which never returns in
   /// time.
   struct SlowMatcherStore {
      inner: Arc<MemoryStore>,
   }

   #[async_trait::async_trait]
   impl GalleryStore for SlowMatcherStore {
      async fn list_images(&self, query: &ImageQuery) -> Result<(Vec<ImageDetail>, u64)> {
         self.inner.list_images(query).await
      }

      async fn get_image(&self, id: ImageId) -> Result<Option<ImageDetail>> {
         self.inner.get_image(id).await
      }

      async fn record_view(&self, id: ImageId) -> Result<u64> {
         self.inner.record_view(id).await
      }

      async fn resolve_tags(&self, names: &[String]) -> Result<Vec<TagId>> {
         self.inner.resolve_tags(names).await
      }

      async fn tags_in_category(&self, category: CategoryId) -> Result<Vec<TagId>> {
         self.inner.tags_in_category(category).await
      }

      async fn images_with_all_tags(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
         self.inner.images_with_all_tags(tags).await
      }

      async fn images_with_any_tag(&self, tags: &[TagId]) -> Result<Vec<ImageId>> {
         self.inner.images_with_any_tag(tags).await
      }

      async fn images_in_album(&self, album: AlbumId) -> Result<Vec<ImageId>> {
         self.inner.images_in_album(album).await
      }

      async fn match_images(
         &self,
         _query: &[f32],
         _threshold: f32,
         _count: usize,
      ) -> Result<Vec<VectorMatch>> {
         tokio::time::sleep(Duration::from_secs(3600)).await;
         Ok(Vec::new())
      }

      async fn suggest_tags(&self, q: &str, limit: usize) -> Result<Vec<Tag>> {
         self.inner.suggest_tags(q, limit).await
      }

      async fn suggest_users(&self, q: &str, limit: usize) -> Result<Vec<User>> {
         self.inner.suggest_users(q, limit).await
      }

      async fn suggest_cameras(&self, q: &str, limit: usize) -> Result<Vec<(String, String)>> {
         self.inner.suggest_cameras(q, limit).await
      }
   }

   struct FailingEmbedder;

   #[async_trait::async_trait]
   impl EmbeddingProvider for FailingEmbedder {
      async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
         Err(GalleryError::upstream("model cold start failed"))
      }

      async fn embed_image(&self, _bytes: &[u8]) -> Result<Vec<f32>> {
         Err(GalleryError::Unsupported("no image model".to_string()))
      }

      fn supports_image_embedding(&self) -> bool {
         false
      }

      fn dimension(&self) -> usize {
         3
      }
   }

   fn seeded_store() -> (Arc<MemoryStore>, Principal) {
      let store = Arc::new(MemoryStore::new());
      let owner = Principal { id: Uuid::new_v4(), role: Role::Editor };
      store.insert_user(User {
         id:         owner.id,
         username:   "ansel".to_string(),
         avatar_url: None,
         is_active:  true,
      });

      let mut add = |title: &str, privacy: Privacy, embedding: Vec<f32>| {
         store.insert_image(Image {
            id: Uuid::new_v4(),
            owner: owner.id,
            privacy,
            title: title.to_string(),
            caption: String::new(),
            alt_text: String::new(),
            camera_make: None,
            camera_model: None,
            license: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            views: 0,
            embedding: Some(embedding),
         });
      };
      add("public-near", Privacy::Public, vec![1.0, 0.0, 0.0]);
      add("private-near", Privacy::Private, vec![0.99, 0.1, 0.0]);
      add("public-far", Privacy::Public, vec![0.0, 1.0, 0.0]);

      (store, owner)
   }

   fn engine(store: &Arc<MemoryStore>, embedder: impl EmbeddingProvider + 'static) -> VectorEngine {
      VectorEngine::new(
         Arc::clone(store) as Arc<dyn GalleryStore>,
         Arc::new(embedder),
         &Config::default(),
      )
   }

   fn text_query(q: &str) -> VectorQuery {
      VectorQuery {
         kind:  VectorQueryKind::Text,
         text:  Some(q.to_string()),
         image: None,
         limit: None,
      }
   }

   #[tokio::test]
   async fn test_anonymous_results_are_permission_pruned() {
      let (store, _) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false });

      let response = eng.search(None, &text_query("ridge line")).await.unwrap();
      // private-near clears the threshold but is pruned; no backfill.
      assert_eq!(response.results.len(), 1);
      assert_eq!(response.results[0].detail.image.title, "public-near");
      assert_eq!(response.total_matches, response.results.len());
   }

   #[tokio::test]
   async fn test_owner_keeps_private_candidates_in_order() {
      let (store, owner) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false });

      let response = eng
         .search(Some(&owner), &text_query("ridge line"))
         .await
         .unwrap();
      assert_eq!(response.results.len(), 2);
      assert!(response.results[0].similarity >= response.results[1].similarity);
      assert_eq!(response.results[0].detail.image.title, "public-near");
      assert_eq!(response.results[1].detail.image.title, "private-near");
   }

   #[tokio::test]
   async fn test_missing_text_is_validation_error() {
      let (store, _) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false });

      let query = VectorQuery {
         kind:  VectorQueryKind::Text,
         text:  Some("   ".to_string()),
         image: None,
         limit: None,
      };
      let err = eng.search(None, &query).await.unwrap_err();
      assert_eq!(err.status(), 400);
   }

   #[tokio::test]
   async fn test_image_query_without_capability_is_unsupported() {
      let (store, _) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false });

      let query = VectorQuery {
         kind:  VectorQueryKind::Image,
         text:  None,
         image: Some(vec![0xFF, 0xD8, 0xFF]),
         limit: None,
      };
      let err = eng.search(None, &query).await.unwrap_err();
      assert_eq!(err.status(), 501);
      assert!(!err.retryable());
   }

   #[tokio::test]
   async fn test_image_query_with_capable_provider_echoes_upload_marker() {
      let (store, _) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: true });

      let query = VectorQuery {
         kind:  VectorQueryKind::Image,
         text:  None,
         image: Some(vec![0xFF, 0xD8, 0xFF]),
         limit: None,
      };
      let response = eng.search(None, &query).await.unwrap();
      assert_eq!(response.query, "image_upload");
      assert_eq!(response.search_type, VectorQueryKind::Image);
   }

   #[tokio::test]
   async fn test_no_candidates_is_empty_success() {
      let (store, _) = seeded_store();
      // Orthogonal to everything above the 0.70 threshold.
      let eng = engine(&store, StubEmbedder { vector: vec![0.0, 0.0, 1.0], images: false });

      let response = eng.search(None, &text_query("abstract")).await.unwrap();
      assert!(response.results.is_empty());
      assert_eq!(response.total_matches, 0);
   }

   #[tokio::test]
   async fn test_provider_failure_surfaces_as_retryable_upstream() {
      let (store, _) = seeded_store();
      let eng = engine(&store, FailingEmbedder);

      let err = eng.search(None, &text_query("anything")).await.unwrap_err();
      assert_eq!(err.status(), 502);
      assert!(err.retryable());
   }

   fn tight_config() -> Config {
      Config {
         embed_timeout_ms: 10,
         match_timeout_ms: 10,
         ..Config::default()
      }
   }

   #[tokio::test]
   async fn test_slow_embedder_hits_budget_as_retryable_timeout() {
      let (store, _) = seeded_store();
      let eng = VectorEngine::new(
         Arc::clone(&store) as Arc<dyn GalleryStore>,
         Arc::new(SlowEmbedder),
         &tight_config(),
      );

      let err = eng.search(None, &text_query("ridge")).await.unwrap_err();
      assert_eq!(err.status(), 503);
      assert!(err.retryable());
   }

   #[tokio::test]
   async fn test_slow_matcher_hits_budget_as_retryable_timeout() {
      let (store, _) = seeded_store();
      let eng = VectorEngine::new(
         Arc::new(SlowMatcherStore { inner: store }) as Arc<dyn GalleryStore>,
         Arc::new(StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false }),
         &tight_config(),
      );

      let err = eng.search(None, &text_query("ridge")).await.unwrap_err();
      assert_eq!(err.status(), 503);
      assert!(err.retryable());
   }

   #[tokio::test]
   async fn test_limit_clamped_to_vector_bounds() {
      let (store, owner) = seeded_store();
      let eng = engine(&store, StubEmbedder { vector: vec![1.0, 0.0, 0.0], images: false });

      let query = VectorQuery { limit: Some(500), ..text_query("ridge") };
      let response = eng.search(Some(&owner), &query).await.unwrap();
      // Clamp happens before the matcher call; with only two candidates
      // above threshold the result is simply both of them.
      assert!(response.results.len() <= VECTOR_LIMIT_MAX as usize);
   }
}
