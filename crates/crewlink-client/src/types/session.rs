//! The authenticated session and the user profile attached to it.

use crate::routing::Site;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile of the signed-in user as returned by the primary API.
///
/// Fields the server does not resend on refresh must survive, so
/// unknown fields are kept in `extra` and merges are non-destructive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>) -> Self {
        UserProfile {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Build a profile from a loose JSON object, falling back to
    /// `username` when the object does not carry one.
    pub fn from_value(value: &Value, username: &str) -> Self {
        let mut profile: UserProfile =
            serde_json::from_value(value.clone()).unwrap_or_default();
        if profile.username.is_empty() {
            profile.username = username.to_string();
        }
        profile
    }

    /// Overlay the non-null fields of `patch` onto this profile.
    /// Fields absent from `patch` keep their current values.
    pub fn merged(&self, patch: &Value) -> UserProfile {
        let Some(patch) = patch.as_object() else {
            return self.clone();
        };
        let mut base = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return self.clone(),
        };
        for (key, value) in patch {
            if !value.is_null() {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(base)).unwrap_or_else(|_| self.clone())
    }
}

/// The authenticated session. Owned by the token store; mutated only
/// by the session coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub profile: UserProfile,
    pub site: Site,
}

impl Session {
    pub fn new(access_token: impl Into<String>, profile: UserProfile, site: Site) -> Self {
        Session {
            access_token: access_token.into(),
            profile,
            site,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut profile = UserProfile::new("mruiz");
        profile.email = Some("mruiz@example.com".into());
        profile.role = Some("agent".into());

        let merged = profile.merged(&json!({"display_name": "M. Ruiz"}));

        assert_eq!(merged.username, "mruiz");
        assert_eq!(merged.display_name.as_deref(), Some("M. Ruiz"));
        assert_eq!(merged.email.as_deref(), Some("mruiz@example.com"));
        assert_eq!(merged.role.as_deref(), Some("agent"));
    }

    #[test]
    fn test_merge_ignores_nulls_and_non_objects() {
        let mut profile = UserProfile::new("mruiz");
        profile.email = Some("mruiz@example.com".into());

        let merged = profile.merged(&json!({"email": null}));
        assert_eq!(merged.email.as_deref(), Some("mruiz@example.com"));

        let merged = profile.merged(&json!("not an object"));
        assert_eq!(merged, profile);
    }

    #[test]
    fn test_merge_preserves_unknown_fields() {
        let profile = UserProfile::new("mruiz")
            .merged(&json!({"branch_office": "Lima Centro"}));
        let merged = profile.merged(&json!({"role": "supervisor"}));

        assert_eq!(
            merged.extra.get("branch_office"),
            Some(&json!("Lima Centro"))
        );
        assert_eq!(merged.role.as_deref(), Some("supervisor"));
    }

    #[test]
    fn test_from_value_username_fallback() {
        let profile = UserProfile::from_value(&json!({"email": "a@b.c"}), "fallback");
        assert_eq!(profile.username, "fallback");
    }
}
