//! Persistence contract used by the services.
//!
//! Writes are atomic per document. Membership and whitelist links are changed
//! with dedicated operations instead of whole-course saves so concurrent
//! enrollments never overwrite each other.

use uuid::Uuid;

use crate::data::course::{Course, EnrollType};
use crate::data::lecture::Lecture;
use crate::data::unit::ContentUnit;
use crate::data::user::User;
use crate::data::whitelist::WhitelistEntry;
use crate::error::StoreError;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;

/// Orders whitelist entries the way the course links them. Entries the course
/// doesn't link come last.
pub(crate) fn sort_by_links(entries: &mut [WhitelistEntry], links: &[Uuid]) {
    entries.sort_by_key(|entry| {
        links
            .iter()
            .position(|id| *id == entry.id)
            .unwrap_or(usize::MAX)
    });
}

#[allow(async_fn_in_trait)]
pub trait Store {
    // Courses

    async fn find_course_by_id(&self, id: Uuid) -> Result<Course, StoreError>;

    /// Inserts or fully replaces a course document.
    async fn save_course(&self, course: &Course) -> Result<(), StoreError>;

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError>;

    async fn set_enroll_policy(
        &self,
        course: Uuid,
        enroll_type: EnrollType,
        access_key: Option<String>,
    ) -> Result<(), StoreError>;

    /// Adds the user to the course's students unless already present.
    /// Returns whether the user was added.
    async fn add_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError>;

    /// Returns whether the user was a student.
    async fn remove_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError>;

    // Users

    async fn find_user_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    async fn find_users(&self) -> Result<Vec<User>, StoreError>;

    // Whitelist

    async fn find_whitelist_entries(&self, course: Uuid) -> Result<Vec<WhitelistEntry>, StoreError>;

    /// Inserts or replaces entries by id.
    async fn save_whitelist_entries(&self, entries: &[WhitelistEntry]) -> Result<(), StoreError>;

    /// Appends entry ids to the course's whitelist, skipping ids already linked.
    async fn link_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError>;

    /// Deletes entries and removes them from the course's whitelist.
    async fn delete_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError>;

    // Units

    async fn find_unit_by_id(&self, id: Uuid) -> Result<ContentUnit, StoreError>;

    async fn save_unit(&self, unit: &ContentUnit) -> Result<(), StoreError>;

    async fn remove_unit(&self, id: Uuid) -> Result<(), StoreError>;

    // Lectures

    async fn find_lecture_by_id(&self, id: Uuid) -> Result<Lecture, StoreError>;

    /// Lecture whose unit list contains `unit`.
    async fn find_lecture_by_unit(&self, unit: Uuid) -> Result<Lecture, StoreError>;

    async fn save_lecture(&self, lecture: &Lecture) -> Result<(), StoreError>;
}
