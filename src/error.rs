use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

/// Errors reported by [`Store`](crate::store::Store) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} '{1}' not found")]
    NotFound(&'static str, Uuid),
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Immutable,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

/// Field level errors collected while validating a document.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> ValidationErrors {
        ValidationErrors(Vec::new())
    }

    pub fn single(field: impl ToString, kind: FieldErrorKind, message: impl ToString) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, kind, message);
        errors
    }

    pub fn push(&mut self, field: impl ToString, kind: FieldErrorKind, message: impl ToString) {
        self.0.push(FieldError {
            field: field.to_string(),
            kind,
            message: message.to_string(),
        });
    }

    pub fn required(&mut self, field: impl ToString) {
        let field = field.to_string();
        let message = format!("'{}' is required.", field);
        self.push(field, FieldErrorKind::Required, message);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|it| it.field == field)
    }

    /// Turns collected errors into a result, `Ok` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|it| it.field.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Reasons for refusing an enrollment or a course staff action.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    CourseInactive,
    NotOnWhitelist,
    InvalidAccessKey,
    NotCourseStaff,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::CourseInactive => "course-inactive",
            Rejection::NotOnWhitelist => "not-on-whitelist",
            Rejection::InvalidAccessKey => "invalid-access-key",
            Rejection::NotCourseStaff => "not-course-staff",
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{kind} '{id}' doesn't exist")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("forbidden: {0}")]
    Forbidden(Rejection),
    #[error("unsupported upload '{0}'")]
    UnsupportedUpload(String),
    #[error("roster contains no rows")]
    EmptyRoster,
    #[error("unable to store upload: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Persistence(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(kind, id) => CoreError::NotFound { kind, id },
            other => CoreError::Persistence(other),
        }
    }
}

impl From<Rejection> for CoreError {
    fn from(r: Rejection) -> Self {
        CoreError::Forbidden(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_core_not_found() {
        let id = Uuid::new_v4();
        let err = CoreError::from(StoreError::NotFound("course", id));
        assert!(matches!(err, CoreError::NotFound { kind: "course", id: found } if found == id));
    }

    #[test]
    fn validation_errors_collect_fields() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.required("name");
        errors.push("type", FieldErrorKind::Invalid, "Unknown unit type.");

        assert!(errors.has_field("name"));
        assert!(errors.has_field("type"));
        assert_eq!(errors.errors()[0].kind, FieldErrorKind::Required);
        assert_eq!(errors.to_string(), "invalid fields: name, type");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn rejection_reasons_are_kebab_case() {
        assert_eq!(Rejection::NotOnWhitelist.to_string(), "not-on-whitelist");
        assert_eq!(
            serde_json::to_value(Rejection::InvalidAccessKey).unwrap(),
            serde_json::json!("invalid-access-key")
        );
    }
}
