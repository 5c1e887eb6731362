use chrono::Utc;
use uuid::Uuid;

use super::ensure_staff;
use super::files::{partition_files, FileAssets, FileStore};
use crate::data::unit::db::{validate_fields, UnitDraft, UnitFields, Upload};
use crate::data::unit::{ContentUnit, FileRecord, UnitKind};
use crate::data::user::User;
use crate::error::{CoreError, FieldErrorKind, StoreError, ValidationErrors};
use crate::store::Store;

fn check_uploads(content: &UnitKind, uploads: &[Upload]) -> Result<(), ValidationErrors> {
    if !uploads.is_empty() && !matches!(content, UnitKind::File(_)) {
        return Err(ValidationErrors::single(
            "files",
            FieldErrorKind::Invalid,
            format!("'{}' units don't take uploads.", content.unit_type()),
        ));
    }
    Ok(())
}

/// Stores uploads for a file unit. Returns the records added to the unit.
async fn attach_uploads<F: FileStore>(
    assets: &FileAssets<F>,
    content: &mut UnitKind,
    uploads: &[Upload],
) -> Result<Vec<FileRecord>, CoreError> {
    let mut added = vec![];
    if let UnitKind::File(unit) = content {
        assets.attach(&mut added, uploads).await?;
        unit.files.extend(added.iter().cloned());
    }
    Ok(added)
}

/// Creates a unit in `course` and appends it to the lecture's unit list.
#[tracing::instrument(skip(store, assets, actor, fields, uploads), fields(actor = %actor.id))]
pub async fn create<S: Store, F: FileStore>(
    store: &S,
    assets: &FileAssets<F>,
    course_id: Uuid,
    lecture_id: Uuid,
    actor: &User,
    fields: &UnitFields,
    uploads: &[Upload],
) -> Result<ContentUnit, CoreError> {
    let course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;
    let mut lecture = store.find_lecture_by_id(lecture_id).await?;

    let UnitDraft {
        name,
        description,
        mut content,
    } = validate_fields(fields)?;
    if !content.owned_files().is_empty() {
        return Err(ValidationErrors::single(
            "files",
            FieldErrorKind::Invalid,
            "Files can only be added by uploading them.",
        )
        .into());
    }
    check_uploads(&content, uploads)?;
    let added = attach_uploads(assets, &mut content, uploads).await?;

    let now = Utc::now();
    let unit = ContentUnit {
        id: Uuid::new_v4(),
        course: course.id,
        name,
        description,
        content,
        created: now,
        updated: now,
    };

    if let Err(e) = store.save_unit(&unit).await {
        assets.release(&added).await;
        return Err(e.into());
    }

    lecture.units.push(unit.id);
    if let Err(e) = store.save_lecture(&lecture).await {
        tracing::error!("Unable to link unit {} into lecture {}: {}", unit.id, lecture.id, e);
        if let Err(e) = store.remove_unit(unit.id).await {
            tracing::error!("Unable to roll back unit {}: {}", unit.id, e);
        }
        assets.release(&added).await;
        return Err(e.into());
    }

    tracing::info!("Created {} unit {} in lecture {}", unit.unit_type(), unit.id, lecture.id);
    Ok(unit)
}

/// Replaces the unit's fields with `fields`, keeping fields the payload omits.
///
/// For file units a `files` list selects which stored files to keep, the rest
/// are released after the record has been saved.
#[tracing::instrument(skip(store, assets, actor, fields, uploads), fields(actor = %actor.id))]
pub async fn replace<S: Store, F: FileStore>(
    store: &S,
    assets: &FileAssets<F>,
    unit_id: Uuid,
    actor: &User,
    fields: &UnitFields,
    uploads: &[Upload],
) -> Result<ContentUnit, CoreError> {
    let existing = store.find_unit_by_id(unit_id).await?;
    let course = store.find_course_by_id(existing.course).await?;
    ensure_staff(&course, actor)?;

    let UnitDraft {
        name,
        description,
        mut content,
    } = existing.merge_fields(fields)?;
    check_uploads(&content, uploads)?;

    let mut removed = vec![];
    if let UnitKind::File(unit) = &mut content {
        let (kept, dropped) = partition_files(existing.content.owned_files(), &unit.files)?;
        unit.files = kept;
        removed = dropped;
    }
    let added = attach_uploads(assets, &mut content, uploads).await?;

    let unit = ContentUnit {
        id: existing.id,
        course: existing.course,
        name,
        description,
        content,
        created: existing.created,
        updated: Utc::now(),
    };

    if let Err(e) = store.save_unit(&unit).await {
        assets.release(&added).await;
        return Err(e.into());
    }

    if !removed.is_empty() {
        let outcome = assets.release(&removed).await;
        tracing::debug!(
            "Released {} of {} replaced files of unit {}",
            outcome.attempted - outcome.failed.len(),
            outcome.attempted,
            unit.id
        );
    }

    tracing::info!("Replaced unit {}", unit.id);
    Ok(unit)
}

/// Removes a unit, releases the files it owns and unlinks it from its lecture.
///
/// File cleanup is best-effort and never fails the removal. Failing to unlink
/// the unit from its lecture fails the operation. A unit no lecture lists
/// counts as already unlinked.
#[tracing::instrument(skip(store, assets, actor), fields(actor = %actor.id))]
pub async fn remove<S: Store, F: FileStore>(
    store: &S,
    assets: &FileAssets<F>,
    unit_id: Uuid,
    actor: &User,
) -> Result<ContentUnit, CoreError> {
    let unit = store.find_unit_by_id(unit_id).await?;
    let course = store.find_course_by_id(unit.course).await?;
    ensure_staff(&course, actor)?;
    let lecture = match store.find_lecture_by_unit(unit.id).await {
        Ok(lecture) => Some(lecture),
        Err(StoreError::NotFound(..)) => {
            tracing::warn!("Unit {} isn't linked into any lecture", unit.id);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let outcome = assets.release(unit.content.owned_files()).await;
    if !outcome.is_clean() {
        tracing::warn!(
            "Removing unit {}, {} of its files couldn't be deleted",
            unit.id,
            outcome.failed.len()
        );
    }

    store.remove_unit(unit.id).await?;

    if let Some(mut lecture) = lecture {
        lecture.unlink(unit.id);
        store.save_lecture(&lecture).await?;
        tracing::info!("Removed unit {} from lecture {}", unit.id, lecture.id);
    } else {
        tracing::info!("Removed unit {}", unit.id);
    }
    Ok(unit)
}

/// Loads a unit as `viewer` may see it. Students never receive solutions.
pub async fn get<S: Store>(store: &S, unit_id: Uuid, viewer: &User) -> Result<ContentUnit, CoreError> {
    let unit = store.find_unit_by_id(unit_id).await?;
    Ok(unit.projected_for(viewer.role))
}
