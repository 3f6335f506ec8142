//! # User Profile
//!
//! Profile record fetched on demand for the signed-in user, and resolution of
//! the avatar reference into a URL served by the telemetry server.
//!
//! Profiles are never persisted; the [`ProfileCache`] lives only as long as
//! the context that owns it.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;

/// File name the server uses for users without a custom picture
pub const DEFAULT_AVATAR: &str = "avatar.png";

/// Body of `GET /users/{id}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserResponse {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Absolute URL of the avatar image
    pub avatar_ref: String,
}

impl UserProfile {
    pub(crate) fn from_response(id: &str, body: UserResponse, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: body.name,
            email: body.email,
            avatar_ref: avatar_url(base_url, body.profile_pic.as_deref()),
        }
    }
}

/// Resolve a `profile_pic` value to its upload URL.
///
/// Missing, empty, or default pictures all resolve to the shared default avatar.
///
/// # Examples
///
/// ```
/// use posture_telemetry::profile::avatar_url;
///
/// assert_eq!(avatar_url("http://host:5000", Some("me.png")), "http://host:5000/uploads/me.png");
/// assert_eq!(avatar_url("http://host:5000", None), "http://host:5000/uploads/avatar.png");
/// ```
pub fn avatar_url(base_url: &str, profile_pic: Option<&str>) -> String {
    let file = match profile_pic.map(str::trim) {
        Some(pic) if !pic.is_empty() && pic != DEFAULT_AVATAR => pic,
        _ => DEFAULT_AVATAR,
    };

    format!("{}/uploads/{}", base_url.trim_end_matches('/'), file)
}

/// Last successfully loaded profile
#[derive(Debug, Default)]
pub struct ProfileCache {
    current: Option<UserProfile>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&UserProfile> {
        self.current.as_ref()
    }

    /// Fold a fetch result into the cache; failures keep the prior profile.
    pub fn update(&mut self, result: Result<UserProfile>) -> Option<&UserProfile> {
        match result {
            Ok(profile) => {
                debug!("Loaded profile for user {}", profile.id);
                self.current = Some(profile);
            }
            Err(e) => warn!("Profile fetch failed, keeping previous profile: {}", e),
        }
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostureError;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            id: "7".to_string(),
            name: name.to_string(),
            email: "ana@example.com".to_string(),
            avatar_ref: avatar_url("http://host", None),
        }
    }

    #[test]
    fn test_avatar_url_rules() {
        let base = "http://host:5000/";
        assert_eq!(avatar_url(base, Some("7_me.jpg")), "http://host:5000/uploads/7_me.jpg");
        assert_eq!(avatar_url(base, Some("avatar.png")), "http://host:5000/uploads/avatar.png");
        assert_eq!(avatar_url(base, Some("")), "http://host:5000/uploads/avatar.png");
        assert_eq!(avatar_url(base, None), "http://host:5000/uploads/avatar.png");
    }

    #[test]
    fn test_from_response() {
        let body: UserResponse = serde_json::from_str(
            r#"{"name": "Ana", "email": "ana@example.com", "profile_pic": "7_me.jpg"}"#,
        )
        .unwrap();

        let profile = UserProfile::from_response("7", body, "http://host");
        assert_eq!(profile.id, "7");
        assert_eq!(profile.name, "Ana");
        assert_eq!(profile.avatar_ref, "http://host/uploads/7_me.jpg");
    }

    #[test]
    fn test_cache_keeps_previous_on_failure() {
        let mut cache = ProfileCache::new();
        assert!(cache.current().is_none());

        cache.update(Ok(profile("Ana")));
        let kept = cache.update(Err(PostureError::HttpStatus {
            status: 404,
            url: "http://host/users/7".to_string(),
        }));

        assert_eq!(kept.map(|p| p.name.as_str()), Some("Ana"));
    }

    #[test]
    fn test_cache_replaced_on_success() {
        let mut cache = ProfileCache::new();
        cache.update(Ok(profile("Ana")));
        cache.update(Ok(profile("Ana B.")));

        assert_eq!(cache.current().unwrap().name, "Ana B.");
    }
}
