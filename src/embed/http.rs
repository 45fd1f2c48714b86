//! Embedding adapter for a text-embeddings-inference style HTTP endpoint.

use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{GalleryError, Result};

pub const DEFAULT_DIMENSION: usize = 384;

pub struct HttpEmbeddingProvider {
   client:    reqwest::Client,
   endpoint:  String,
   dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
   inputs: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

impl HttpEmbeddingProvider {
   pub fn new(endpoint: &str, timeout: std::time::Duration) -> Result<Self> {
      let client = reqwest::Client::builder()
         .timeout(timeout)
         .build()
         .map_err(|e| GalleryError::upstream(format!("embedding client init failed: {e}")))?;
      Ok(Self {
         client,
         endpoint: endpoint.trim_end_matches('/').to_string(),
         dimension: DEFAULT_DIMENSION,
      })
   }

   pub fn from_config(cfg: &crate::config::Config) -> Result<Self> {
      Self::new(&cfg.embed_endpoint, cfg.embed_timeout())
   }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
   async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
      let url = format!("{}/embed", self.endpoint);
      let response = self
         .client
         .post(&url)
         .json(&EmbedRequest { inputs: [text] })
         .send()
         .await
         .map_err(|e| {
            if e.is_timeout() {
               GalleryError::Timeout("embedding provider".to_string())
            } else {
               GalleryError::upstream(format!("embedding request failed: {e}"))
            }
         })?;

      if !response.status().is_success() {
         return Err(GalleryError::upstream(format!(
            "embedding provider returned {}",
            response.status()
         )));
      }

      let EmbedResponse(mut vectors) = response
         .json()
         .await
         .map_err(|e| GalleryError::upstream(format!("embedding response malformed: {e}")))?;

      let vector = vectors
         .pop()
         .filter(|v| !v.is_empty())
         .ok_or_else(|| GalleryError::upstream("embedding provider returned no vector"))?;

      Ok(vector)
   }

   async fn embed_image(&self, _bytes: &[u8]) -> Result<Vec<f32>> {
      // The configured text model cannot embed images; a multimodal model
      // (e.g. CLIP) behind its own adapter would be required.
      Err(GalleryError::Unsupported("image embedding is not available".to_string()))
   }

   fn supports_image_embedding(&self) -> bool {
      false
   }

   fn dimension(&self) -> usize {
      self.dimension
   }
}
