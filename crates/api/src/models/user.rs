//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{Email, UserId, UserRole};

/// A registered customer or admin.
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields.
///
/// Absent fields are left unchanged; an empty string clears an optional
/// contact field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
}

impl ProfileUpdate {
    /// Trim every field and turn blank contact fields into `Some(None)`.
    ///
    /// Returns `None` for the name when it was given but blank, which the
    /// caller must reject.
    #[must_use]
    pub fn normalized_name(&self) -> Option<Option<String>> {
        self.name.as_ref().map(|n| {
            let trimmed = n.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    }
}

/// Trim an optional contact field, mapping blank input to `None`.
#[must_use]
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
