//! Visibility and mutation rights.
//!
//! Single source of truth for who may see or touch a gallery entity. All
//! predicates here are pure: absent users or images come out as "deny",
//! never as an error. Distinguishing 404 from 403 is the request layer's
//! job, not this module's.

use crate::types::{Album, Image, Principal, Privacy, Role};

/// A named permission grant held by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
   ManageUsers,
   ManageAllImages,
   ManageAllAlbums,
   DeleteAnyImage,
   ViewPrivateImages,
   ModerateComments,
   ManageTags,
   ManageCategories,
   ViewAnalytics,
   UploadImages,
   EditOwnImages,
   DeleteOwnImages,
   CreateAlbums,
   EditOwnAlbums,
   ViewUnlistedImages,
   ModerateOwnComments,
   CreateTags,
   ViewPublicImages,
   CommentOnImages,
   LikeImages,
}

impl Capability {
   pub fn as_str(self) -> &'static str {
      match self {
         Self::ManageUsers => "manage_users",
         Self::ManageAllImages => "manage_all_images",
         Self::ManageAllAlbums => "manage_all_albums",
         Self::DeleteAnyImage => "delete_any_image",
         Self::ViewPrivateImages => "view_private_images",
         Self::ModerateComments => "moderate_comments",
         Self::ManageTags => "manage_tags",
         Self::ManageCategories => "manage_categories",
         Self::ViewAnalytics => "view_analytics",
         Self::UploadImages => "upload_images",
         Self::EditOwnImages => "edit_own_images",
         Self::DeleteOwnImages => "delete_own_images",
         Self::CreateAlbums => "create_albums",
         Self::EditOwnAlbums => "edit_own_albums",
         Self::ViewUnlistedImages => "view_unlisted_images",
         Self::ModerateOwnComments => "moderate_own_comments",
         Self::CreateTags => "create_tags",
         Self::ViewPublicImages => "view_public_images",
         Self::CommentOnImages => "comment_on_images",
         Self::LikeImages => "like_images",
      }
   }
}

/// Flat role -> capability tables. Each role's set is explicit; nothing is
/// inherited, which keeps the grants auditable in one place.
const ADMIN_CAPS: &[Capability] = &[
   Capability::ManageUsers,
   Capability::ManageAllImages,
   Capability::ManageAllAlbums,
   Capability::DeleteAnyImage,
   Capability::ViewPrivateImages,
   Capability::ModerateComments,
   Capability::ManageTags,
   Capability::ManageCategories,
   Capability::ViewAnalytics,
];

const EDITOR_CAPS: &[Capability] = &[
   Capability::UploadImages,
   Capability::EditOwnImages,
   Capability::DeleteOwnImages,
   Capability::CreateAlbums,
   Capability::EditOwnAlbums,
   Capability::ViewUnlistedImages,
   Capability::ModerateOwnComments,
   Capability::CreateTags,
];

const VISITOR_CAPS: &[Capability] = &[
   Capability::ViewPublicImages,
   Capability::CommentOnImages,
   Capability::LikeImages,
];

pub fn capabilities(role: Role) -> &'static [Capability] {
   match role {
      Role::Admin => ADMIN_CAPS,
      Role::Editor => EDITOR_CAPS,
      Role::Visitor => VISITOR_CAPS,
   }
}

pub fn has_capability(role: Role, capability: Capability) -> bool {
   capabilities(role).contains(&capability)
}

/// Privacy predicate compiled into every relational query, before any other
/// filter. Parameters can narrow it further but never widen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
   /// No privacy predicate (admin).
   All,
   /// `privacy = public` only (anonymous).
   PublicOnly,
   /// `privacy IN (public[, unlisted]) OR owner = viewer`.
   VisibleTo {
      viewer:           crate::types::UserId,
      include_unlisted: bool,
   },
}

pub fn view_scope(principal: Option<&Principal>) -> Visibility {
   match principal {
      None => Visibility::PublicOnly,
      Some(p) if p.role == Role::Admin => Visibility::All,
      Some(p) => Visibility::VisibleTo {
         viewer:           p.id,
         include_unlisted: has_capability(p.role, Capability::ViewUnlistedImages),
      },
   }
}

pub fn can_view(principal: Option<&Principal>, image: &Image) -> bool {
   if image.privacy == Privacy::Public {
      return true;
   }
   let Some(user) = principal else {
      return false;
   };
   if user.role == Role::Admin {
      return true;
   }
   if image.owner == user.id {
      return true;
   }
   match image.privacy {
      Privacy::Unlisted => has_capability(user.role, Capability::ViewUnlistedImages),
      Privacy::Private => has_capability(user.role, Capability::ViewPrivateImages),
      Privacy::Public => unreachable!("handled above"),
   }
}

pub fn can_modify(principal: Option<&Principal>, image: &Image) -> bool {
   let Some(user) = principal else {
      return false;
   };
   if has_capability(user.role, Capability::ManageAllImages) {
      return true;
   }
   image.owner == user.id && has_capability(user.role, Capability::EditOwnImages)
}

pub fn can_delete(principal: Option<&Principal>, image: &Image) -> bool {
   let Some(user) = principal else {
      return false;
   };
   if has_capability(user.role, Capability::DeleteAnyImage) {
      return true;
   }
   image.owner == user.id && has_capability(user.role, Capability::DeleteOwnImages)
}

pub fn can_view_album(principal: Option<&Principal>, album: &Album) -> bool {
   if album.privacy == Privacy::Public {
      return true;
   }
   let Some(user) = principal else {
      return false;
   };
   if user.role == Role::Admin {
      return true;
   }
   if album.owner == user.id {
      return true;
   }
   match album.privacy {
      Privacy::Unlisted => has_capability(user.role, Capability::ViewUnlistedImages),
      Privacy::Private => has_capability(user.role, Capability::ViewPrivateImages),
      Privacy::Public => unreachable!("handled above"),
   }
}
