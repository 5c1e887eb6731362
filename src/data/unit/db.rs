use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{
    CodeKataUnit, ContentUnit, FileRecord, FileUnit, FileUnitType, FreeTextUnit, Task, TaskUnit,
    UnitKind, UnitType,
};
use crate::error::{FieldErrorKind, ValidationErrors};

/// Flat field map submitted when creating or replacing a unit.
pub type UnitFields = Map<String, Value>;

/// Fields which are never taken over from a replacement payload.
const PROTECTED_FIELDS: [&str; 4] = ["_id", "id", "created", "updated"];

/// A binary uploaded together with a unit.
#[derive(Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl ToString, bytes: impl Into<Vec<u8>>) -> Upload {
        Upload {
            file_name: file_name.to_string(),
            bytes: bytes.into(),
        }
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Upload:{} ({} bytes)", self.file_name, self.bytes.len())
    }
}

/// Validated unit content, not yet bound to an id.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDraft {
    pub name: String,
    pub description: String,
    pub content: UnitKind,
}

pub struct FieldReader<'a> {
    fields: &'a UnitFields,
    errors: ValidationErrors,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a UnitFields) -> FieldReader<'a> {
        FieldReader {
            fields,
            errors: ValidationErrors::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|it| !it.is_null())
    }

    /// Non-empty string field.
    pub fn text(&mut self, key: &str) -> Option<String> {
        match self.optional_text(key) {
            Some(s) if !s.trim().is_empty() => Some(s),
            Some(_) | None => {
                if !self.errors.has_field(key) {
                    self.errors.required(key);
                }
                None
            }
        }
    }

    pub fn optional_text(&mut self, key: &str) -> Option<String> {
        match self.get(key) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors
                    .push(key, FieldErrorKind::Invalid, format!("'{}' must be a string.", key));
                None
            }
        }
    }

    pub fn value<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(it) => Some(it),
            Err(e) => {
                self.errors.push(key, FieldErrorKind::Invalid, e);
                None
            }
        }
    }

    pub fn required_value<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        if self.get(key).is_none() {
            self.errors.required(key);
            return None;
        }
        self.value(key)
    }

    pub fn error(&mut self, field: impl ToString, kind: FieldErrorKind, message: impl ToString) {
        self.errors.push(field, kind, message);
    }

    pub fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(it) if self.errors.is_empty() => Ok(it),
            _ => Err(self.errors),
        }
    }
}

/// Variant specific field validation.
pub trait VariantFields: Sized {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self>;
}

impl VariantFields for FileUnit {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let file_unit_type = reader.required_value::<FileUnitType>("file_unit_type");
        let files = reader.value::<Vec<FileRecord>>("files").unwrap_or_default();

        Some(FileUnit {
            file_unit_type: file_unit_type?,
            files,
        })
    }
}

impl VariantFields for CodeKataUnit {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let definition = reader.text("definition");
        let test = reader.text("test");
        let code = reader.optional_text("code");

        Some(CodeKataUnit {
            definition: definition?,
            test: test?,
            code,
        })
    }
}

impl VariantFields for TaskUnit {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let tasks = reader.value::<Vec<Task>>("tasks").unwrap_or_default();

        for (i, task) in tasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                reader.error(
                    format!("tasks.{}.name", i),
                    FieldErrorKind::Required,
                    "Every task needs a question.",
                );
            }
        }

        Some(TaskUnit { tasks })
    }
}

impl VariantFields for FreeTextUnit {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        Some(FreeTextUnit {
            markdown: reader.text("markdown")?,
        })
    }
}

fn read_content(unit_type: UnitType, reader: &mut FieldReader<'_>) -> Option<UnitKind> {
    match unit_type {
        UnitType::File => FileUnit::read(reader).map(UnitKind::File),
        UnitType::CodeKata => CodeKataUnit::read(reader).map(UnitKind::CodeKata),
        UnitType::Task => TaskUnit::read(reader).map(UnitKind::Task),
        UnitType::FreeText => FreeTextUnit::read(reader).map(UnitKind::FreeText),
    }
}

fn read_type(reader: &mut FieldReader<'_>) -> Option<UnitType> {
    let tag = reader.text("type")?;
    let unit_type = UnitType::from_tag(&tag);
    if unit_type.is_none() {
        reader.error(
            "type",
            FieldErrorKind::Invalid,
            format!("Unknown unit type '{}'.", tag),
        );
    }
    unit_type
}

/// Validates a full set of unit fields, dispatching on `type`.
pub fn validate_fields(fields: &UnitFields) -> Result<UnitDraft, ValidationErrors> {
    let mut reader = FieldReader::new(fields);

    let unit_type = read_type(&mut reader);
    let name = reader.text("name");
    let description = reader.optional_text("description").unwrap_or_default();
    let content = unit_type.and_then(|t| read_content(t, &mut reader));

    let draft = match (name, content) {
        (Some(name), Some(content)) => Some(UnitDraft {
            name,
            description,
            content,
        }),
        _ => None,
    };
    reader.finish(draft)
}

impl ContentUnit {
    /// Flat field view of the stored unit, the inverse of [`validate_fields`].
    pub fn to_fields(&self) -> UnitFields {
        let mut fields = match serde_json::to_value(&self.content) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("name".to_string(), Value::from(self.name.clone()));
        fields.insert(
            "description".to_string(),
            Value::from(self.description.clone()),
        );
        fields
    }

    /// Merges `incoming` over the stored fields. Absent and `null` fields keep
    /// their stored value, `type` and the owning course can't change.
    pub fn merge_fields(&self, incoming: &UnitFields) -> Result<UnitDraft, ValidationErrors> {
        let incoming: UnitFields = incoming
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let mut errors = ValidationErrors::new();

        if let Some(tag) = incoming.get("type") {
            if tag.as_str() != Some(self.unit_type().as_str()) {
                errors.push(
                    "type",
                    FieldErrorKind::Immutable,
                    "Unit type can't be changed.",
                );
            }
        }
        for key in ["_course", "course"] {
            if let Some(course) = incoming.get(key) {
                if course.as_str() != Some(self.course.to_string().as_str()) {
                    errors.push(key, FieldErrorKind::Immutable, "Unit can't change course.");
                }
            }
        }
        errors.into_result()?;

        let mut merged = self.to_fields();
        for (key, value) in &incoming {
            if PROTECTED_FIELDS.contains(&key.as_str()) || key == "_course" || key == "course" {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }

        validate_fields(&merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn fields(value: Value) -> UnitFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("fields must be an object"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let errors = validate_fields(&fields(json!({"type": "quiz", "name": "Intro"}))).unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.errors()[0].field, "type");
        assert_eq!(errors.errors()[0].kind, FieldErrorKind::Invalid);
    }

    #[test]
    fn file_unit_requires_file_unit_type_but_not_files() {
        let errors = validate_fields(&fields(json!({"type": "file", "name": "Slides"}))).unwrap_err();
        assert!(errors.has_field("file_unit_type"));

        let draft = validate_fields(&fields(
            json!({"type": "file", "name": "Slides", "file_unit_type": "video"}),
        ))
        .unwrap();
        match draft.content {
            UnitKind::File(f) => {
                assert_eq!(f.file_unit_type, FileUnitType::Video);
                assert!(f.files.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn errors_are_collected_per_field() {
        let errors = validate_fields(&fields(json!({"type": "code-kata", "test": 3}))).unwrap_err();
        assert!(errors.has_field("name"));
        assert!(errors.has_field("definition"));
        let test = errors.errors().iter().find(|e| e.field == "test").unwrap();
        assert_eq!(test.kind, FieldErrorKind::Invalid);
    }

    #[test]
    fn tasks_need_questions() {
        let errors = validate_fields(&fields(json!({
            "type": "task",
            "name": "Quiz",
            "tasks": [{"name": "What is 'static?", "answers": []}, {"name": " "}]
        })))
        .unwrap_err();
        assert!(errors.has_field("tasks.1.name"));
        assert!(!errors.has_field("tasks.0.name"));
    }

    #[test]
    fn merge_keeps_absent_fields_and_guards_type() {
        let unit = ContentUnit {
            id: Uuid::new_v4(),
            course: Uuid::new_v4(),
            name: "Lifetimes".to_string(),
            description: "Chapter 10".to_string(),
            content: UnitKind::FreeText(FreeTextUnit {
                markdown: "old".to_string(),
            }),
            created: Utc::now(),
            updated: Utc::now(),
        };

        let draft = unit.merge_fields(&fields(json!({"markdown": "new"}))).unwrap();
        assert_eq!(draft.name, "Lifetimes");
        assert_eq!(draft.description, "Chapter 10");
        assert_eq!(
            draft.content,
            UnitKind::FreeText(FreeTextUnit {
                markdown: "new".to_string()
            })
        );

        let errors = unit.merge_fields(&fields(json!({"type": "task"}))).unwrap_err();
        assert_eq!(errors.errors()[0].kind, FieldErrorKind::Immutable);

        let errors = unit.merge_fields(&fields(json!({"markdown": ""}))).unwrap_err();
        assert!(errors.has_field("markdown"));
    }

    #[test]
    fn merge_treats_null_as_absent() {
        let record = FileRecord {
            path: "uploads/abc.pdf".to_string(),
            name: "abc.pdf".to_string(),
            alias: "slides.pdf".to_string(),
            size: 10,
        };
        let unit = ContentUnit {
            id: Uuid::new_v4(),
            course: Uuid::new_v4(),
            name: "Slides".to_string(),
            description: "Week 1".to_string(),
            content: UnitKind::File(FileUnit {
                file_unit_type: FileUnitType::File,
                files: vec![record.clone()],
            }),
            created: Utc::now(),
            updated: Utc::now(),
        };

        let draft = unit
            .merge_fields(&fields(json!({"files": null, "description": null, "type": null})))
            .unwrap();
        assert_eq!(draft.description, "Week 1");
        assert_eq!(draft.content.owned_files(), &[record][..]);
    }
}
