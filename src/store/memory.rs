//! In-process [`Store`] backed by hash maps.
//!
//! Suitable for tests and embedding. Every operation takes one lock, so each
//! call is atomic the same way a single document write is.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::Store;
use crate::data::course::{Course, EnrollType};
use crate::data::lecture::Lecture;
use crate::data::unit::ContentUnit;
use crate::data::user::User;
use crate::data::whitelist::WhitelistEntry;
use crate::error::StoreError;

#[derive(Default)]
struct Collections {
    courses: HashMap<Uuid, Course>,
    users: HashMap<Uuid, User>,
    whitelist: HashMap<Uuid, WhitelistEntry>,
    units: HashMap<Uuid, ContentUnit>,
    lectures: HashMap<Uuid, Lecture>,
    failing: HashSet<&'static str>,
}

impl Collections {
    fn check(&self, collection: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(collection) {
            return Err(StoreError::Backend(format!(
                "writes to '{}' are failing",
                collection
            )));
        }
        Ok(())
    }

    fn course_mut(&mut self, id: Uuid) -> Result<&mut Course, StoreError> {
        self.check("courses")?;
        self.courses
            .get_mut(&id)
            .ok_or(StoreError::NotFound("course", id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Registers a user account. Accounts are owned by the authentication layer.
    pub fn insert_user(&self, user: User) {
        if let Ok(mut inner) = self.lock() {
            inner.users.insert(user.id, user);
        }
    }

    /// Makes every following write to `collection` fail.
    pub fn fail_writes_to(&self, collection: &'static str) {
        if let Ok(mut inner) = self.lock() {
            inner.failing.insert(collection);
        }
    }
}

impl Store for MemoryStore {
    async fn find_course_by_id(&self, id: Uuid) -> Result<Course, StoreError> {
        self.lock()?
            .courses
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("course", id))
    }

    async fn save_course(&self, course: &Course) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("courses")?;
        inner.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("courses")?;
        inner
            .courses
            .remove(&id)
            .ok_or(StoreError::NotFound("course", id))?;
        inner.whitelist.retain(|_, entry| entry.course != id);
        Ok(())
    }

    async fn set_enroll_policy(
        &self,
        course: Uuid,
        enroll_type: EnrollType,
        access_key: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let course = inner.course_mut(course)?;
        course.enroll_type = enroll_type;
        course.access_key = access_key;
        Ok(())
    }

    async fn add_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let course = inner.course_mut(course)?;
        if course.students.contains(&user) {
            return Ok(false);
        }
        course.students.push(user);
        Ok(true)
    }

    async fn remove_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let course = inner.course_mut(course)?;
        let before = course.students.len();
        course.students.retain(|it| *it != user);
        Ok(course.students.len() != before)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("user", id))
    }

    async fn find_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn find_whitelist_entries(&self, course: Uuid) -> Result<Vec<WhitelistEntry>, StoreError> {
        let inner = self.lock()?;
        let order = inner
            .courses
            .get(&course)
            .map(|it| it.whitelist.clone())
            .unwrap_or_default();

        let mut entries: Vec<WhitelistEntry> = inner
            .whitelist
            .values()
            .filter(|it| it.course == course)
            .cloned()
            .collect();
        super::sort_by_links(&mut entries, &order);
        Ok(entries)
    }

    async fn save_whitelist_entries(&self, entries: &[WhitelistEntry]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("whitelist")?;
        for entry in entries {
            inner.whitelist.insert(entry.id, entry.clone());
        }
        Ok(())
    }

    async fn link_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let course = inner.course_mut(course)?;
        for id in ids {
            if !course.whitelist.contains(id) {
                course.whitelist.push(*id);
            }
        }
        Ok(())
    }

    async fn delete_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.course_mut(course)?.whitelist.retain(|it| !ids.contains(it));
        inner.check("whitelist")?;
        inner
            .whitelist
            .retain(|id, entry| entry.course != course || !ids.contains(id));
        Ok(())
    }

    async fn find_unit_by_id(&self, id: Uuid) -> Result<ContentUnit, StoreError> {
        self.lock()?
            .units
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("unit", id))
    }

    async fn save_unit(&self, unit: &ContentUnit) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("units")?;
        inner.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn remove_unit(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("units")?;
        inner
            .units
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("unit", id))
    }

    async fn find_lecture_by_id(&self, id: Uuid) -> Result<Lecture, StoreError> {
        self.lock()?
            .lectures
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("lecture", id))
    }

    async fn find_lecture_by_unit(&self, unit: Uuid) -> Result<Lecture, StoreError> {
        self.lock()?
            .lectures
            .values()
            .find(|it| it.units.contains(&unit))
            .cloned()
            .ok_or(StoreError::NotFound("lecture", unit))
    }

    async fn save_lecture(&self, lecture: &Lecture) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check("lectures")?;
        inner.lectures.insert(lecture.id, lecture.clone());
        Ok(())
    }
}
