use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ImageId = Uuid;
pub type UserId = Uuid;
pub type TagId = Uuid;
pub type CategoryId = Uuid;
pub type AlbumId = Uuid;

/// Per-entity visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
   Public,
   Unlisted,
   Private,
}

impl Privacy {
   pub fn parse(value: &str) -> Option<Self> {
      match value {
         "public" => Some(Self::Public),
         "unlisted" => Some(Self::Unlisted),
         "private" => Some(Self::Private),
         _ => None,
      }
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
   Admin,
   Editor,
   #[serde(alias = "user")]
   Visitor,
}

/// The requesting identity. Anonymous requests carry no principal at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
   pub id:   UserId,
   pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
   pub id:         UserId,
   pub username:   String,
   pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
   pub id:         UserId,
   pub username:   String,
   pub avatar_url: Option<String>,
   pub is_active:  bool,
}

impl User {
   pub fn summary(&self) -> UserSummary {
      UserSummary {
         id:         self.id,
         username:   self.username.clone(),
         avatar_url: self.avatar_url.clone(),
      }
   }
}

/// A stored asset record. The embedding never leaves the server; it is
/// loaded from snapshots but stripped from every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
   pub id:           ImageId,
   pub owner:        UserId,
   pub privacy:      Privacy,
   pub title:        String,
   #[serde(default)]
   pub caption:      String,
   #[serde(default)]
   pub alt_text:     String,
   pub camera_make:  Option<String>,
   pub camera_model: Option<String>,
   pub license:      Option<String>,
   pub created_at:   DateTime<Utc>,
   pub updated_at:   DateTime<Utc>,
   #[serde(default)]
   pub views:        u64,
   #[serde(default, skip_serializing)]
   pub embedding:    Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
   pub id:           TagId,
   /// Unique, case-normalized name.
   pub name:         String,
   pub display_name: String,
   pub category_id:  Option<CategoryId>,
   #[serde(default)]
   pub usage_count:  u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
   pub id:    CategoryId,
   pub name:  String,
   pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
   pub id:      AlbumId,
   pub owner:   UserId,
   pub privacy: Privacy,
   pub title:   String,
}

/// Image hydrated with its owner summary and tag list, as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetail {
   #[serde(flatten)]
   pub image: Image,
   pub owner: UserSummary,
   pub tags:  Vec<TagRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRef {
   pub id:           TagId,
   pub name:         String,
   pub display_name: String,
}

/// Vector-search hit: hydrated image plus its cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredImage {
   #[serde(flatten)]
   pub detail:     ImageDetail,
   pub similarity: f32,
}

/// Candidate returned by the nearest-neighbor matcher, before hydration
/// and permission pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
   pub id:         ImageId,
   pub similarity: f32,
}

/// Sparse, request-scoped filter set for `/api/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
   pub q:            Option<String>,
   pub tags:         Option<Vec<String>>,
   pub category_id:  Option<CategoryId>,
   pub user_id:      Option<UserId>,
   pub album_id:     Option<AlbumId>,
   pub camera_make:  Option<String>,
   pub camera_model: Option<String>,
   pub date_from:    Option<NaiveDate>,
   pub date_to:      Option<NaiveDate>,
   pub license:      Option<String>,
   pub sort_by:      Option<String>,
   pub sort_order:   Option<String>,
   pub page:         Option<u32>,
   pub limit:        Option<u32>,
}

/// Request-scoped parameters for `/api/images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
   pub privacy:    Option<String>,
   pub user_id:    Option<UserId>,
   pub page:       Option<u32>,
   pub limit:      Option<u32>,
   pub sort_by:    Option<String>,
   pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorQueryKind {
   Text,
   Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorQuery {
   pub kind:  VectorQueryKind,
   /// Text query; required when `kind` is `Text`.
   pub text:  Option<String>,
   /// Raw image bytes; required when `kind` is `Image`.
   pub image: Option<Vec<u8>>,
   pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Suggestion {
   Tag {
      value:   String,
      display: String,
      count:   u64,
   },
   User {
      value:   UserId,
      display: String,
      avatar:  Option<String>,
   },
   Camera {
      value:   String,
      display: String,
   },
}
