use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

pub mod db;

pub static UNIT_COLLECTION_NAME: &str = "units";

/// Discriminator of [`UnitKind`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitType {
    File,
    CodeKata,
    Task,
    FreeText,
}

impl UnitType {
    pub const ALL: [UnitType; 4] = [
        UnitType::File,
        UnitType::CodeKata,
        UnitType::Task,
        UnitType::FreeText,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::File => "file",
            UnitType::CodeKata => "code-kata",
            UnitType::Task => "task",
            UnitType::FreeText => "free-text",
        }
    }

    pub fn from_tag(tag: &str) -> Option<UnitType> {
        UnitType::ALL.iter().copied().find(|it| it.as_str() == tag)
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary resource owned by exactly one file unit.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Location in the binary store.
    pub path: String,
    /// Randomized storage name, unique across all units.
    pub name: String,
    /// Original file name as uploaded.
    pub alias: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileUnitType {
    File,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUnit {
    pub file_unit_type: FileUnitType,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeKataUnit {
    pub definition: String,
    pub test: String,
    /// Reference solution, hidden from students.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTextUnit {
    pub markdown: String,
}

/// Type specific part of a content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UnitKind {
    File(FileUnit),
    CodeKata(CodeKataUnit),
    Task(TaskUnit),
    FreeText(FreeTextUnit),
}

impl UnitKind {
    pub fn unit_type(&self) -> UnitType {
        match self {
            UnitKind::File(_) => UnitType::File,
            UnitKind::CodeKata(_) => UnitType::CodeKata,
            UnitKind::Task(_) => UnitType::Task,
            UnitKind::FreeText(_) => UnitType::FreeText,
        }
    }

    /// Binary resources this unit exclusively owns.
    pub fn owned_files(&self) -> &[FileRecord] {
        match self {
            UnitKind::File(unit) => &unit.files,
            _ => &[],
        }
    }

    /// Hides solutions before the unit is sent to a student.
    pub fn project_for(&mut self, role: Role) {
        if role.sees_solutions() {
            return;
        }

        match self {
            UnitKind::CodeKata(kata) => kata.code = Some(String::new()),
            UnitKind::Task(unit) => unit
                .tasks
                .iter_mut()
                .flat_map(|task| task.answers.iter_mut())
                .for_each(|answer| answer.value = false),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(rename = "_course", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content: UnitKind,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

impl ContentUnit {
    pub fn unit_type(&self) -> UnitType {
        self.content.unit_type()
    }

    /// Copy of the unit as it may be shown to a user with `role`.
    pub fn projected_for(&self, role: Role) -> ContentUnit {
        let mut unit = self.clone();
        unit.content.project_for(role);
        unit
    }
}
