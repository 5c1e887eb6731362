use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::normalize_name;

pub static WHITELIST_COLLECTION_NAME: &str = "whitelist";

/// Normalized identity triple. Names are trimmed and lower-cased, the uid is
/// case-sensitive and kept as given.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IdentityKey {
    pub first_name: String,
    pub last_name: String,
    pub uid: String,
}

impl IdentityKey {
    pub fn new(first_name: impl AsRef<str>, last_name: impl AsRef<str>, uid: impl ToString) -> Self {
        IdentityKey {
            first_name: normalize_name(first_name),
            last_name: normalize_name(last_name),
            uid: uid.to_string(),
        }
    }
}

/// A pre-approved identity allowed to self-enroll into a whitelist course.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(rename = "_course", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl WhitelistEntry {
    pub fn new(course: Uuid, key: IdentityKey, email: Option<String>) -> WhitelistEntry {
        WhitelistEntry {
            id: Uuid::new_v4(),
            course,
            first_name: key.first_name,
            last_name: key.last_name,
            uid: key.uid,
            email,
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            uid: self.uid.clone(),
        }
    }

    /// Whether the identity matches this entry. Both sides are normalized so a
    /// legacy entry stored with capitals still matches.
    pub fn matches(&self, identity: &IdentityKey) -> bool {
        normalize_name(&self.first_name) == identity.first_name
            && normalize_name(&self.last_name) == identity.last_name
            && self.uid == identity.uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_symmetric_in_name_case() {
        let mut entry = WhitelistEntry::new(
            Uuid::new_v4(),
            IdentityKey::new("ada", "lovelace", "al1"),
            None,
        );
        assert!(entry.matches(&IdentityKey::new("ADA", "Lovelace", "al1")));
        assert!(!entry.matches(&IdentityKey::new("ada", "lovelace", "AL1")));

        entry.first_name = "Ada".to_string();
        assert!(entry.matches(&IdentityKey::new("ada", "lovelace", "al1")));
    }
}
