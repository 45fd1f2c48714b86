use thiserror::Error;

/// Service error taxonomy.
///
/// Each variant maps to a stable status class so the IPC layer can answer
/// with the same codes an HTTP front would. Empty results are never errors.
#[derive(Debug, Error)]
pub enum GalleryError {
   #[error("{0}")]
   Validation(String),

   #[error("authentication required")]
   Unauthenticated,

   #[error("insufficient permissions")]
   Forbidden { required: Option<String> },

   #[error("{0} not found")]
   NotFound(&'static str),

   #[error("unsupported operation: {0}")]
   Unsupported(String),

   #[error("upstream error: {0}")]
   Upstream(String),

   #[error("timed out: {0}")]
   Timeout(String),

   #[error("io error")]
   Io(#[from] std::io::Error),

   #[error("serialization error")]
   Serialization(#[from] serde_json::Error),

   #[error(transparent)]
   Other(#[from] anyhow::Error),
}

impl GalleryError {
   pub fn validation(msg: impl Into<String>) -> Self {
      Self::Validation(msg.into())
   }

   pub fn upstream(msg: impl Into<String>) -> Self {
      Self::Upstream(msg.into())
   }

   pub fn forbidden() -> Self {
      Self::Forbidden { required: None }
   }

   pub fn forbidden_missing(capability: &str) -> Self {
      Self::Forbidden { required: Some(capability.to_string()) }
   }

   /// Status class reported to clients.
   pub fn status(&self) -> u16 {
      match self {
         Self::Validation(_) => 400,
         Self::Unauthenticated => 401,
         Self::Forbidden { .. } => 403,
         Self::NotFound(_) => 404,
         Self::Unsupported(_) => 501,
         Self::Upstream(_) => 502,
         Self::Timeout(_) => 503,
         Self::Io(_) | Self::Serialization(_) | Self::Other(_) => 500,
      }
   }

   /// Whether a caller may retry the identical request with backoff.
   pub fn retryable(&self) -> bool {
      matches!(self, Self::Upstream(_) | Self::Timeout(_))
   }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_status_classes() {
      assert_eq!(GalleryError::validation("bad").status(), 400);
      assert_eq!(GalleryError::Unauthenticated.status(), 401);
      assert_eq!(GalleryError::forbidden().status(), 403);
      assert_eq!(GalleryError::NotFound("image").status(), 404);
      assert_eq!(GalleryError::Unsupported("x".into()).status(), 501);
      assert_eq!(GalleryError::upstream("down").status(), 502);
      assert_eq!(GalleryError::Timeout("embed".into()).status(), 503);
   }

   #[test]
   fn test_only_upstream_kinds_are_retryable() {
      assert!(GalleryError::upstream("down").retryable());
      assert!(GalleryError::Timeout("match".into()).retryable());
      assert!(!GalleryError::validation("bad").retryable());
      assert!(!GalleryError::forbidden().retryable());
   }

   #[test]
   fn test_forbidden_carries_required_capability() {
      let err = GalleryError::forbidden_missing("view_private_images");
      match err {
         GalleryError::Forbidden { required } => {
            assert_eq!(required.as_deref(), Some("view_private_images"));
         },
         other => panic!("unexpected error: {other}"),
      }
   }
}
