//! Auth collaborator seam.
//!
//! Resolves a bearer credential to a principal. An absent credential is
//! anonymous, never an error; an unknown credential is an authentication
//! failure.

use std::{collections::HashMap, sync::Arc};

use crate::{
   config::TokenEntry,
   error::{GalleryError, Result},
   types::Principal,
};

#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
   async fn authenticate(&self, token: &str) -> Result<Principal>;

   /// Maps an optional credential: `None` stays anonymous.
   async fn resolve(&self, token: Option<&str>) -> Result<Option<Principal>> {
      match token {
         None => Ok(None),
         Some(t) => Ok(Some(self.authenticate(t).await?)),
      }
   }
}

#[async_trait::async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
   async fn authenticate(&self, token: &str) -> Result<Principal> {
      (**self).authenticate(token).await
   }
}

/// Static token table from configuration.
pub struct StaticTokenAuth {
   tokens: HashMap<String, Principal>,
}

impl StaticTokenAuth {
   pub fn new(entries: &[TokenEntry]) -> Self {
      let tokens = entries
         .iter()
         .map(|e| (e.token.clone(), Principal { id: e.user_id, role: e.role }))
         .collect();
      Self { tokens }
   }
}

#[async_trait::async_trait]
impl Authenticator for StaticTokenAuth {
   async fn authenticate(&self, token: &str) -> Result<Principal> {
      self
         .tokens
         .get(token)
         .copied()
         .ok_or(GalleryError::Unauthenticated)
   }
}
