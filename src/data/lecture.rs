use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub static LECTURE_COLLECTION_NAME: &str = "lectures";

/// Ordered group of content units. Lectures are managed elsewhere, units only
/// link and unlink themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecture {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub units: Vec<Uuid>,
}

impl Lecture {
    pub fn new(name: impl ToString) -> Lecture {
        Lecture {
            id: Uuid::new_v4(),
            name: name.to_string(),
            units: vec![],
        }
    }

    /// Removes the unit wherever it is in the list. Returns whether it was linked.
    pub fn unlink(&mut self, unit: Uuid) -> bool {
        let before = self.units.len();
        self.units.retain(|it| *it != unit);
        self.units.len() != before
    }
}
