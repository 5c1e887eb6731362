//! Parsing of uploaded course rosters.
//!
//! A roster is comma separated text whose first line names the columns. The
//! `firstName`, `lastName` and `uid` columns are required, `email` is optional.
//! Bad rows are collected as [`RowError`]s, they never abort the import.

use serde::Serialize;

use crate::data::whitelist::IdentityKey;
use crate::error::{CoreError, FieldErrorKind, ValidationErrors};
use crate::util::{self, normalize_name};

pub const ROSTER_EXTENSION: &str = "csv";

const REQUIRED_COLUMNS: [Column; 3] = [Column::FirstName, Column::LastName, Column::Uid];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Column {
    FirstName,
    LastName,
    Uid,
    Email,
}

impl Column {
    fn from_header(name: &str) -> Option<Column> {
        let name: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();

        match name.as_str() {
            "firstname" => Some(Column::FirstName),
            "lastname" => Some(Column::LastName),
            "uid" => Some(Column::Uid),
            "email" => Some(Column::Email),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Column::FirstName => "firstName",
            Column::LastName => "lastName",
            Column::Uid => "uid",
            Column::Email => "email",
        }
    }
}

/// Normalized candidate whitelist entry.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RosterRow {
    /// 1-based line in the uploaded file.
    pub line: usize,
    pub first_name: String,
    pub last_name: String,
    pub uid: String,
    pub email: Option<String>,
}

impl RosterRow {
    pub fn new(first_name: &str, last_name: &str, uid: &str) -> RosterRow {
        RosterRow {
            line: 0,
            first_name: normalize_name(first_name),
            last_name: normalize_name(last_name),
            uid: uid.trim().to_string(),
            email: None,
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            uid: self.uid.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ParsedRoster {
    pub rows: Vec<RosterRow>,
    pub errors: Vec<RowError>,
}

/// Rejects uploads which aren't `.csv` files or exceed `max_size` bytes.
pub fn accept_upload(file_name: &str, size: usize, max_size: usize) -> Result<(), CoreError> {
    if !util::has_extension(file_name, ROSTER_EXTENSION) {
        return Err(CoreError::UnsupportedUpload(file_name.to_string()));
    }
    if size > max_size {
        return Err(ValidationErrors::single(
            "file",
            FieldErrorKind::Invalid,
            format!("Roster is larger than {} bytes.", max_size),
        )
        .into());
    }
    Ok(())
}

/// Splits one line into fields. Fields may be quoted with `"`, a doubled quote
/// inside a quoted field is a literal quote.
fn split_record(line: &str) -> Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => field.push(c),
            (false, '"') if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, c) => field.push(c),
        }
    }

    if quoted {
        return Err("unterminated quoted field");
    }
    fields.push(field);
    Ok(fields)
}

struct Header {
    columns: Vec<Option<Column>>,
}

impl Header {
    fn parse(line: &str) -> Result<Header, ValidationErrors> {
        let names = split_record(line)
            .map_err(|e| ValidationErrors::single("header", FieldErrorKind::Invalid, e))?;
        let columns: Vec<Option<Column>> =
            names.iter().map(|it| Column::from_header(it.trim())).collect();

        let mut errors = ValidationErrors::new();
        for required in REQUIRED_COLUMNS {
            if !columns.contains(&Some(required)) {
                errors.push(
                    "header",
                    FieldErrorKind::Required,
                    format!("Missing '{}' column.", required.name()),
                );
            }
        }
        errors.into_result()?;

        Ok(Header { columns })
    }

    fn row(&self, line: usize, text: &str) -> Result<RosterRow, String> {
        let fields = split_record(text).map_err(str::to_string)?;
        if fields.len() != self.columns.len() {
            return Err(format!(
                "expected {} columns, found {}",
                self.columns.len(),
                fields.len()
            ));
        }

        let value = |column: Column| -> Option<&str> {
            self.columns
                .iter()
                .position(|it| *it == Some(column))
                .map(|i| fields[i].trim())
                .filter(|it| !it.is_empty())
        };

        let mut missing = vec![];
        for column in REQUIRED_COLUMNS {
            if value(column).is_none() {
                missing.push(column.name());
            }
        }
        if !missing.is_empty() {
            return Err(format!("missing {}", missing.join(", ")));
        }

        Ok(RosterRow {
            line,
            first_name: normalize_name(value(Column::FirstName).unwrap_or_default()),
            last_name: normalize_name(value(Column::LastName).unwrap_or_default()),
            uid: value(Column::Uid).unwrap_or_default().to_string(),
            email: value(Column::Email).map(|it| it.to_lowercase()),
        })
    }
}

/// Parses roster bytes. Only an unreadable file or an unusable header fail the
/// whole parse.
pub fn parse(bytes: &[u8]) -> Result<ParsedRoster, ValidationErrors> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        ValidationErrors::single("file", FieldErrorKind::Invalid, "Roster must be UTF-8 text.")
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let header = match lines.next() {
        Some((_, line)) => Header::parse(line)?,
        None => {
            return Err(ValidationErrors::single(
                "header",
                FieldErrorKind::Required,
                "Roster is empty.",
            ))
        }
    };

    let mut roster = ParsedRoster::default();
    for (line, text) in lines {
        match header.row(line, text) {
            Ok(row) => roster.rows.push(row),
            Err(reason) => roster.errors.push(RowError { line, reason }),
        }
    }

    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_rows() {
        let roster = parse(b"firstName,lastName,uid\n  Ada , LOVELACE ,  AL1 \n").unwrap();
        assert!(roster.errors.is_empty());
        assert_eq!(roster.rows.len(), 1);
        let row = &roster.rows[0];
        assert_eq!(row.first_name, "ada");
        assert_eq!(row.last_name, "lovelace");
        assert_eq!(row.uid, "AL1");
        assert_eq!(row.line, 2);
    }

    #[test]
    fn header_is_case_insensitive_and_order_independent() {
        let roster = parse(b"UID,Email,LastName,FIRSTNAME\r\nal1,Ada@Example.org,Lovelace,Ada\r\n").unwrap();
        let row = &roster.rows[0];
        assert_eq!(row.uid, "al1");
        assert_eq!(row.first_name, "ada");
        assert_eq!(row.email.as_deref(), Some("ada@example.org"));
    }

    #[test]
    fn missing_uid_is_a_row_error() {
        let roster = parse(b"firstName,lastName,uid\nAda,Lovelace\n").unwrap();
        assert!(roster.rows.is_empty());
        assert_eq!(roster.errors.len(), 1);
        assert_eq!(roster.errors[0].line, 2);

        let roster = parse(b"firstName,lastName,uid\nAda,Lovelace, \n").unwrap();
        assert_eq!(roster.errors[0].reason, "missing uid");
    }

    #[test]
    fn counts_valid_and_malformed_rows() {
        let file = b"firstName,lastName,uid\n\
                     Ada,Lovelace,al1\n\
                     \n\
                     Alan,Turing\n\
                     Grace,Hopper,gh1\n\
                     ,Knuth,dk1\n\
                     \"Lovelace, Ada\",\"King\",al2\n";
        let roster = parse(file).unwrap();
        assert_eq!(roster.rows.len(), 3);
        assert_eq!(roster.errors.len(), 2);
        assert_eq!(
            roster.errors.iter().map(|e| e.line).collect::<Vec<_>>(),
            vec![4, 6]
        );
        assert_eq!(roster.rows[2].first_name, "lovelace, ada");
    }

    #[test]
    fn header_without_rows_is_empty_roster() {
        let roster = parse(b"firstName,lastName,uid\n\n").unwrap();
        assert_eq!(roster, ParsedRoster::default());
    }

    #[test]
    fn bad_header_fails_the_parse() {
        let errors = parse(b"name,uid\nAda,al1\n").unwrap_err();
        assert!(errors.has_field("header"));
        assert!(parse(b"").is_err());
        assert!(parse(&[0xff, 0xfe]).unwrap_err().has_field("file"));
    }

    #[test]
    fn quoted_fields() {
        assert_eq!(
            split_record(r#"a,"b, c","say ""hi""""#).unwrap(),
            vec!["a", "b, c", r#"say "hi""#]
        );
        assert!(split_record(r#"a,"b"#).is_err());
    }

    #[test]
    fn only_csv_uploads_are_accepted() {
        assert!(accept_upload("roster.csv", 10, 100).is_ok());
        assert!(accept_upload("ROSTER.CSV", 10, 100).is_ok());
        assert!(matches!(
            accept_upload("roster.xlsx", 10, 100),
            Err(CoreError::UnsupportedUpload(_))
        ));
        assert!(matches!(
            accept_upload("roster.csv", 101, 100),
            Err(CoreError::Validation(_))
        ));
    }
}
