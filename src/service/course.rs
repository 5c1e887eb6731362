use uuid::Uuid;

use super::ensure_staff;
use crate::data::course::db::EnrollPolicyData;
use crate::data::course::Course;
use crate::data::user::User;
use crate::error::{CoreError, Rejection};
use crate::store::Store;

/// Creates a course owned by `actor`, who becomes its first teacher.
#[tracing::instrument(skip(store, actor, course), fields(actor = %actor.id, course = %course.name))]
pub async fn create_course<S: Store>(
    store: &S,
    actor: &User,
    mut course: Course,
) -> Result<Course, CoreError> {
    if !actor.role.can_author() {
        return Err(Rejection::NotCourseStaff.into());
    }
    course.validate()?;

    if !course.is_teacher(actor.id) {
        course.teachers.push(actor.id);
    }
    store.save_course(&course).await?;
    tracing::info!("Created course {} ({})", course.id, course.name);

    Ok(course)
}

/// Switches the enrollment policy. The whitelist is kept so switching back
/// restores it.
#[tracing::instrument(skip(store, actor, data), fields(actor = %actor.id))]
pub async fn set_enroll_policy<S: Store>(
    store: &S,
    course_id: Uuid,
    actor: &User,
    data: EnrollPolicyData,
) -> Result<Course, CoreError> {
    let mut course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;

    course.enroll_type = data.enroll_type;
    course.access_key = data.access_key.filter(|it| !it.is_empty());
    course.validate()?;

    store
        .set_enroll_policy(course.id, course.enroll_type, course.access_key.clone())
        .await?;
    tracing::info!("Course {} now uses {:?} enrollment", course.id, course.enroll_type);

    Ok(course)
}

/// Deletes a course together with its whitelist entries.
#[tracing::instrument(skip(store, actor), fields(actor = %actor.id))]
pub async fn delete_course<S: Store>(
    store: &S,
    course_id: Uuid,
    actor: &User,
) -> Result<(), CoreError> {
    let course = store.find_course_by_id(course_id).await?;
    ensure_staff(&course, actor)?;

    store.delete_course(course.id).await?;
    tracing::info!("Deleted course {}", course.id);
    Ok(())
}
