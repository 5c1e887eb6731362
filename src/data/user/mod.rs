use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::whitelist::IdentityKey;
use crate::role::Role;

pub static USER_COLLECTION_NAME: &str = "users";

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

/// Authenticated identity as handed over by the authentication layer. Trusted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    /// Institution identifier (matriculation number or similar).
    pub uid: String,
    pub profile: Profile,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(
        uid: impl ToString,
        first_name: impl ToString,
        last_name: impl ToString,
        role: Role,
    ) -> User {
        let uid = uid.to_string();
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, uid.as_bytes());

        User {
            id,
            uid,
            profile: Profile {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            },
            role,
        }
    }

    /// Normalized identity triple used for whitelist matching.
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(&self.profile.first_name, &self.profile.last_name, &self.uid)
    }
}
