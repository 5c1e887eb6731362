use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::roster::{self, RosterRow, RowError};
use super::ensure_staff;
use crate::config::Config;
use crate::data::user::User;
use crate::data::whitelist::{IdentityKey, WhitelistEntry};
use crate::error::CoreError;
use crate::store::Store;

/// Classification of roster rows against a course's current whitelist.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MergePlan {
    pub to_insert: Vec<WhitelistEntry>,
    pub to_update: Vec<WhitelistEntry>,
    pub unchanged: Vec<WhitelistEntry>,
}

impl MergePlan {
    /// Entries which have to be written.
    pub fn changed(&self) -> Vec<WhitelistEntry> {
        self.to_insert
            .iter()
            .chain(self.to_update.iter())
            .cloned()
            .collect()
    }
}

/// Entry ids are derived from course and identity, so merging the same rows
/// twice produces the same entries.
fn entry_id(course: Uuid, key: &IdentityKey) -> Uuid {
    let name = [key.first_name.as_str(), key.last_name.as_str(), key.uid.as_str()].join("\u{0}");
    Uuid::new_v5(&course, name.as_bytes())
}

/// Merges roster rows into the existing entries of `course`.
///
/// Import only adds and updates. Entries absent from the roster are left
/// alone, a partial upload must not revoke anyone's access. When a key occurs
/// several times in `rows` the last occurrence wins. A row without an email
/// keeps the stored email.
pub fn merge(course: Uuid, existing: &[WhitelistEntry], rows: &[RosterRow]) -> MergePlan {
    let by_key: HashMap<IdentityKey, &WhitelistEntry> = existing
        .iter()
        .map(|it| (IdentityKey::new(&it.first_name, &it.last_name, &it.uid), it))
        .collect();

    let mut order: Vec<IdentityKey> = vec![];
    let mut latest: HashMap<IdentityKey, &RosterRow> = HashMap::new();
    for row in rows {
        let key = row.key();
        if latest.insert(key.clone(), row).is_none() {
            order.push(key);
        }
    }

    let mut plan = MergePlan::default();
    for key in order {
        let row = latest[&key];
        match by_key.get(&key) {
            Some(entry) => {
                if row.email.is_some() && row.email != entry.email {
                    let mut updated = (*entry).clone();
                    updated.email = row.email.clone();
                    plan.to_update.push(updated);
                } else {
                    plan.unchanged.push((*entry).clone());
                }
            }
            None => {
                let mut entry = WhitelistEntry::new(course, key, row.email.clone());
                entry.id = entry_id(course, &entry.key());
                plan.to_insert.push(entry);
            }
        }
    }

    plan
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum MatchStatus {
    Registered { user: Uuid },
    Unregistered,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CheckedRow {
    #[serde(flatten)]
    pub row: RosterRow,
    pub match_status: MatchStatus,
}

/// Annotates rows with the registered account carrying the same identity, if any.
pub fn check_against_users(rows: &[RosterRow], users: &[User]) -> Vec<CheckedRow> {
    let accounts: HashMap<IdentityKey, Uuid> =
        users.iter().map(|it| (it.identity(), it.id)).collect();

    rows.iter()
        .map(|row| CheckedRow {
            row: row.clone(),
            match_status: match accounts.get(&row.key()) {
                Some(user) => MatchStatus::Registered { user: *user },
                None => MatchStatus::Unregistered,
            },
        })
        .collect()
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<RowError>,
}

/// Imports an uploaded roster into the course's whitelist.
#[tracing::instrument(skip(store, config, actor, bytes), fields(actor = %actor.id))]
pub async fn import_roster<S: Store>(
    store: &S,
    config: &Config,
    course_id: Uuid,
    actor: &User,
    file_name: &str,
    bytes: &[u8],
) -> Result<ImportReport, CoreError> {
    let course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;
    roster::accept_upload(file_name, bytes.len(), config.max_roster_size)?;

    let parsed = roster::parse(bytes)?;
    if parsed.rows.is_empty() && parsed.errors.is_empty() {
        return Err(CoreError::EmptyRoster);
    }

    let existing = store.find_whitelist_entries(course.id).await?;
    let plan = merge(course.id, &existing, &parsed.rows);

    store.save_whitelist_entries(&plan.changed()).await?;
    // Every row is linked, so entries saved without their link get repaired.
    let ids: Vec<Uuid> = plan
        .to_insert
        .iter()
        .chain(plan.to_update.iter())
        .chain(plan.unchanged.iter())
        .map(|it| it.id)
        .collect();
    if !ids.is_empty() {
        store.link_whitelist_entries(course.id, &ids).await?;
    }

    let report = ImportReport {
        inserted: plan.to_insert.len(),
        updated: plan.to_update.len(),
        unchanged: plan.unchanged.len(),
        errors: parsed.errors,
    };
    tracing::info!(
        "Imported roster '{}': {} inserted, {} updated, {} unchanged, {} bad rows",
        file_name,
        report.inserted,
        report.updated,
        report.unchanged,
        report.errors.len()
    );

    Ok(report)
}

/// Parses a roster and reports which rows resolve to registered accounts.
/// Nothing is persisted.
#[tracing::instrument(skip(store, config, actor, bytes), fields(actor = %actor.id))]
pub async fn check_roster<S: Store>(
    store: &S,
    config: &Config,
    course_id: Uuid,
    actor: &User,
    file_name: &str,
    bytes: &[u8],
) -> Result<Vec<CheckedRow>, CoreError> {
    let course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;
    roster::accept_upload(file_name, bytes.len(), config.max_roster_size)?;

    let parsed = roster::parse(bytes)?;
    let users = store.find_users().await?;
    Ok(check_against_users(&parsed.rows, &users))
}

#[tracing::instrument(skip(store, actor), fields(actor = %actor.id))]
pub async fn remove_whitelist_entry<S: Store>(
    store: &S,
    course_id: Uuid,
    actor: &User,
    entry: Uuid,
) -> Result<(), CoreError> {
    let course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;

    if !course.whitelist.contains(&entry) {
        let stored = store.find_whitelist_entries(course.id).await?;
        if !stored.iter().any(|it| it.id == entry) {
            return Err(CoreError::NotFound {
                kind: "whitelist entry",
                id: entry,
            });
        }
        tracing::debug!("Whitelist entry {} isn't linked to course {}", entry, course.id);
    }

    store.delete_whitelist_entries(course.id, &[entry]).await?;
    tracing::info!("Removed whitelist entry {} from course {}", entry, course.id);
    Ok(())
}
