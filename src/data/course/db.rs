use super::EnrollType;

use serde::{Deserialize, Serialize};

/// Data submitted by a student trying to join a course.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollData {
    #[serde(default)]
    pub access_key: Option<String>,
}

impl EnrollData {
    pub fn with_key(key: impl ToString) -> EnrollData {
        EnrollData {
            access_key: Some(key.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollPolicyData {
    pub enroll_type: EnrollType,
    #[serde(default)]
    pub access_key: Option<String>,
}

/// Result of a successful enrollment attempt.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enrollment {
    Enrolled,
    AlreadyEnrolled,
}
