//! Embedding provider seam.
//!
//! The embedding model is an external black box: text in, fixed-length
//! vector out. Image embedding is a declared capability rather than an
//! assumption, so a provider without a multimodal model fails loudly
//! instead of fabricating a vector.

pub mod http;

use std::sync::Arc;

pub use http::HttpEmbeddingProvider;

use crate::error::Result;

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
   /// Embeds a text query into a fixed-length vector.
   async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

   /// Embeds raw image bytes. Only valid when
   /// [`supports_image_embedding`](Self::supports_image_embedding) is true;
   /// otherwise returns an unsupported-operation error.
   async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>>;

   /// Whether this provider can embed images at all.
   fn supports_image_embedding(&self) -> bool;

   /// Vector length this provider produces.
   fn dimension(&self) -> usize;
}

#[async_trait::async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
   async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
      (**self).embed_text(text).await
   }

   async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
      (**self).embed_image(bytes).await
   }

   fn supports_image_embedding(&self) -> bool {
      (**self).supports_image_embedding()
   }

   fn dimension(&self) -> usize {
      (**self).dimension()
   }
}
