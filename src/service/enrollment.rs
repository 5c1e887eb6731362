use uuid::Uuid;

use crate::data::course::db::{EnrollData, Enrollment};
use crate::data::course::{Course, EnrollType};
use crate::data::user::User;
use crate::data::whitelist::WhitelistEntry;
use crate::error::{CoreError, Rejection};
use crate::store::Store;

/// Decides whether `user` may join `course` under the course's policy.
///
/// `whitelist` are the stored entries of the course; entries not referenced by
/// `course.whitelist` are ignored. Membership isn't checked here.
pub fn evaluate(
    course: &Course,
    user: &User,
    whitelist: &[WhitelistEntry],
    data: &EnrollData,
) -> Result<(), Rejection> {
    if !course.active {
        return Err(Rejection::CourseInactive);
    }

    match course.enroll_type {
        EnrollType::Free => Ok(()),
        EnrollType::Whitelist => {
            let identity = user.identity();
            let listed = whitelist
                .iter()
                .filter(|entry| course.whitelist.contains(&entry.id))
                .any(|entry| entry.matches(&identity));

            if listed {
                Ok(())
            } else {
                Err(Rejection::NotOnWhitelist)
            }
        }
        EnrollType::AccessKey => match course.access_key.as_deref() {
            None | Some("") => Ok(()),
            Some(key) if data.access_key.as_deref() == Some(key) => Ok(()),
            Some(_) => Err(Rejection::InvalidAccessKey),
        },
    }
}

/// Adds `user` to the course's students if the course policy allows it.
/// Enrolling twice is not an error.
#[tracing::instrument(skip(store, user, data), fields(user = %user.id))]
pub async fn enroll<S: Store>(
    store: &S,
    course_id: Uuid,
    user: &User,
    data: &EnrollData,
) -> Result<Enrollment, CoreError> {
    let course = store.find_course_by_id(course_id).await?;

    let whitelist = match course.enroll_type {
        EnrollType::Whitelist => store.find_whitelist_entries(course.id).await?,
        _ => vec![],
    };

    if let Err(rejection) = evaluate(&course, user, &whitelist, data) {
        tracing::info!("Enrollment of {} into {} rejected: {}", user.id, course.id, rejection);
        return Err(rejection.into());
    }

    if course.is_student(user.id) {
        return Ok(Enrollment::AlreadyEnrolled);
    }

    if store.add_student(course.id, user.id).await? {
        tracing::info!("Enrolled {} into {}", user.id, course.id);
        Ok(Enrollment::Enrolled)
    } else {
        Ok(Enrollment::AlreadyEnrolled)
    }
}

/// Removes `user` from the course's students wherever it is listed. Leaving is
/// always allowed and succeeds whether or not the user was enrolled.
#[tracing::instrument(skip(store, user), fields(user = %user.id))]
pub async fn leave<S: Store>(store: &S, course_id: Uuid, user: &User) -> Result<(), CoreError> {
    if store.remove_student(course_id, user.id).await? {
        tracing::info!("{} left course {}", user.id, course_id);
    } else {
        tracing::debug!("{} wasn't a student of {}", user.id, course_id);
    }
    Ok(())
}
