use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FieldErrorKind, ValidationErrors};
use crate::role::Role;

pub mod db;

pub static COURSE_COLLECTION_NAME: &str = "courses";

fn true_bool() -> bool {
    true
}

/// Policy deciding who may join a course as a student.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollType {
    Free,
    Whitelist,
    AccessKey,
}

impl Default for EnrollType {
    fn default() -> Self {
        EnrollType::Free
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "true_bool")]
    pub active: bool,

    #[serde(default)]
    pub enroll_type: EnrollType,
    #[serde(default)]
    pub access_key: Option<String>,

    /// Ids of this course's whitelist entries, in import order.
    #[serde(default)]
    pub whitelist: Vec<Uuid>,
    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default)]
    pub teachers: Vec<Uuid>,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Course {
    pub fn new(name: impl ToString, enroll_type: EnrollType, access_key: Option<String>) -> Course {
        Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            active: true,
            enroll_type,
            access_key,
            whitelist: vec![],
            students: vec![],
            teachers: vec![],
            created: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.required("name");
        }

        let has_key = self
            .access_key
            .as_ref()
            .map(|it| !it.is_empty())
            .unwrap_or(false);
        match (self.enroll_type, has_key) {
            (EnrollType::AccessKey, false) => errors.required("access_key"),
            (EnrollType::Free | EnrollType::Whitelist, true) => errors.push(
                "access_key",
                FieldErrorKind::Invalid,
                "Access key is only allowed for access key courses.",
            ),
            _ => {}
        }

        errors.into_result()
    }

    pub fn is_student(&self, user: Uuid) -> bool {
        self.students.contains(&user)
    }

    pub fn is_teacher(&self, user: Uuid) -> bool {
        self.teachers.contains(&user)
    }

    /// Admins and the course's own teachers may manage it.
    pub fn is_staff(&self, user: Uuid, role: Role) -> bool {
        role == Role::Admin || (role.can_author() && self.is_teacher(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_required_for_access_key_courses() {
        let course = Course::new("Rust 101", EnrollType::AccessKey, None);
        let errors = course.validate().unwrap_err();
        assert!(errors.has_field("access_key"));

        let course = Course::new("Rust 101", EnrollType::AccessKey, Some("s3cr3t".into()));
        assert!(course.validate().is_ok());
    }

    #[test]
    fn access_key_rejected_for_other_policies() {
        let course = Course::new("Rust 101", EnrollType::Whitelist, Some("s3cr3t".into()));
        assert!(course.validate().unwrap_err().has_field("access_key"));
    }

    #[test]
    fn staff_requires_teacher_membership() {
        let teacher = Uuid::new_v4();
        let mut course = Course::new("Rust 101", EnrollType::Free, None);
        assert!(!course.is_staff(teacher, Role::Teacher));
        course.teachers.push(teacher);
        assert!(course.is_staff(teacher, Role::Teacher));
        assert!(!course.is_staff(teacher, Role::Student));
        assert!(course.is_staff(Uuid::new_v4(), Role::Admin));
    }

    #[test]
    fn enroll_type_names() {
        assert_eq!(
            serde_json::to_string(&EnrollType::AccessKey).unwrap(),
            "\"accesskey\""
        );
    }
}
