use std::fmt::{Display, Formatter};
use std::io::Cursor;

use rocket::http::hyper::header::CONTENT_LANGUAGE;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CoreError, StoreError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub status: Status,
    pub type_uri: String,
    pub title: String,
    pub detail: Option<String>,

    pub body: Map<String, Value>,
}

impl Problem {
    pub fn new(status: Status, type_uri: impl ToString, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: type_uri.to_string(),
            title: title.to_string(),
            detail: None,
            body: Map::new(),
        }
    }

    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem::new(status, "about:blank", title)
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    /// Adds a serialized extension member. Values which can't be represented
    /// as JSON are stored as `null`.
    pub fn insert<V: Serialize>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.body.insert(key.to_string(), value);
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Full problem document including the RFC7807 members.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = self.body.clone();
        body.insert("type".to_string(), Value::from(self.type_uri.as_str()));
        body.insert("title".to_string(), Value::from(self.title.as_str()));
        body.insert("status".to_string(), Value::from(self.status.code));
        if let Some(detail) = &self.detail {
            body.insert("detail".to_string(), Value::from(detail.as_str()));
        }
        body
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = Value::Object(self.to_json()).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header(CONTENT_LANGUAGE.as_str(), "en")
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

pub mod problems {
    pub static VALIDATION_TYPE: &str = "/problems/validation";
    pub static FORBIDDEN_TYPE: &str = "/problems/forbidden";
    pub static NOT_FOUND_TYPE: &str = "/problems/not-found";
    pub static UPLOAD_TYPE: &str = "/problems/upload";
}

impl From<CoreError> for Problem {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(errors) => {
                Problem::new(Status::BadRequest, problems::VALIDATION_TYPE, "Invalid fields.")
                    .insert("errors", errors.errors())
                    .to_owned()
            }
            CoreError::NotFound { kind, id } => Problem::new(
                Status::NotFound,
                problems::NOT_FOUND_TYPE,
                format!("The {} doesn't exist.", kind),
            )
            .insert_str("id", id)
            .to_owned(),
            CoreError::Forbidden(reason) => Problem::new(
                Status::Forbidden,
                problems::FORBIDDEN_TYPE,
                "Action not permitted.",
            )
            .insert_str("reason", reason)
            .to_owned(),
            CoreError::UnsupportedUpload(name) => Problem::new(
                Status::BadRequest,
                problems::UPLOAD_TYPE,
                "Unsupported upload.",
            )
            .detail("Only .csv files are accepted.")
            .insert_str("file", name)
            .to_owned(),
            CoreError::EmptyRoster => Problem::new(
                Status::BadRequest,
                problems::UPLOAD_TYPE,
                "Roster contains no rows.",
            ),
            CoreError::Storage(e) => Problem::from(e),
            CoreError::Persistence(e) => Problem::from(e),
        }
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(..) => Problem::from(CoreError::from(e)),
            StoreError::Database(e) => Problem::from(e),
            StoreError::BsonSer(_) | StoreError::BsonDe(_) => Problem::new_untyped(
                Status::InternalServerError,
                "An error occurred while processing BSON data.",
            ),
            StoreError::Backend(_) => Problem::new_untyped(
                Status::InternalServerError,
                "Storage backend failed while processing request.",
            ),
        }
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let title = match e.kind.as_ref() {
            ErrorKind::Authentication { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::InvalidTlsConfig { .. } => "Server was unable to access MongoDB.",
            ErrorKind::InvalidArgument { .. } | ErrorKind::Command(_) | ErrorKind::BulkWrite(_) => {
                "MongoDB was unable to process bad server request."
            }
            _ => "MongoDB failed while processing request.",
        };

        let mut problem = Problem::new_untyped(Status::InternalServerError, title);
        if matches!(e.kind.as_ref(), ErrorKind::Io(_) | ErrorKind::Write(_)) {
            problem.detail("Submitted data might not be properly stored.");
        }
        problem
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldErrorKind, Rejection, ValidationErrors};
    use uuid::Uuid;

    #[test]
    fn validation_errors_are_listed() {
        let problem = Problem::from(CoreError::Validation(ValidationErrors::single(
            "file_unit_type",
            FieldErrorKind::Required,
            "'file_unit_type' is required.",
        )));
        assert_eq!(problem.status, Status::BadRequest);
        assert_eq!(problem.body["errors"][0]["field"], "file_unit_type");
        assert_eq!(problem.body["errors"][0]["kind"], "required");
    }

    #[test]
    fn rejections_are_forbidden_with_reason() {
        let problem = Problem::from(CoreError::Forbidden(Rejection::NotOnWhitelist));
        assert_eq!(problem.status, Status::Forbidden);
        assert_eq!(problem.body["reason"], "not-on-whitelist");
    }

    #[test]
    fn missing_documents_are_not_found() {
        let id = Uuid::new_v4();
        let problem = Problem::from(StoreError::NotFound("lecture", id));
        assert_eq!(problem.status, Status::NotFound);
        assert_eq!(problem.body["id"], id.to_string());
    }

    #[test]
    fn rfc_members_are_included() {
        let json = Problem::from(CoreError::UnsupportedUpload("roster.xlsx".into())).to_json();
        assert_eq!(json["status"], 400);
        assert_eq!(json["type"], problems::UPLOAD_TYPE);
        assert_eq!(json["file"], "roster.xlsx");
        assert!(json.contains_key("detail"));
    }

    #[test]
    fn storage_failures_are_internal() {
        let problem = Problem::from(CoreError::Persistence(StoreError::Backend("down".into())));
        assert_eq!(problem.status, Status::InternalServerError);
        let problem = Problem::from(CoreError::EmptyRoster);
        assert_eq!(problem.status, Status::BadRequest);
    }
}
