//! Course enrollment and content unit operations.
//!
//! Services take the store and the acting user explicitly. The acting user is
//! trusted as handed over by the authentication layer.

use crate::data::course::Course;
use crate::data::user::User;
use crate::error::Rejection;

pub mod course;
pub mod enrollment;
pub mod files;
pub mod roster;
pub mod unit;
pub mod whitelist;

/// Only admins and the course's teachers may manage a course.
pub fn ensure_staff(course: &Course, actor: &User) -> Result<(), Rejection> {
    if course.is_staff(actor.id, actor.role) {
        Ok(())
    } else {
        tracing::debug!("User {} isn't staff of course {}", actor.id, course.id);
        Err(Rejection::NotCourseStaff)
    }
}
