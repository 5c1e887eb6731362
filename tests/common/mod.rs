#![allow(dead_code)]

use std::sync::Mutex;

use courseware_backend::data::course::{Course, EnrollType};
use courseware_backend::data::lecture::Lecture;
use courseware_backend::data::user::User;
use courseware_backend::role::Role;
use courseware_backend::service::files::{Deletion, FileAssets, FileStore, StoredFile};
use courseware_backend::store::{MemoryStore, Store};
use serde_json::Value;

/// File store keeping nothing but a log of what was asked of it.
#[derive(Default)]
pub struct RecordingFileStore {
    pub written: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_deletes: bool,
}

impl RecordingFileStore {
    pub fn failing() -> Self {
        RecordingFileStore {
            fail_deletes: true,
            ..Default::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl FileStore for RecordingFileStore {
    async fn write_uploaded_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        let path = format!("memory/{}", name);
        self.written.lock().unwrap().push(path.clone());
        Ok(StoredFile {
            path,
            size: bytes.len() as u64,
        })
    }

    async fn delete_file(&self, path: &str) -> Deletion {
        self.deleted.lock().unwrap().push(path.to_string());
        if self.fail_deletes {
            Deletion::Failed("no such file".to_string())
        } else {
            Deletion::Deleted
        }
    }
}

pub struct World {
    pub store: MemoryStore,
    pub assets: FileAssets<RecordingFileStore>,
    pub teacher: User,
    pub course: Course,
    pub lecture: Lecture,
}

pub async fn world(enroll_type: EnrollType, access_key: Option<&str>) -> World {
    world_with(enroll_type, access_key, RecordingFileStore::default()).await
}

pub async fn world_with(
    enroll_type: EnrollType,
    access_key: Option<&str>,
    files: RecordingFileStore,
) -> World {
    let store = MemoryStore::new();
    let teacher = User::new("t1", "Barbara", "Liskov", Role::Teacher);
    store.insert_user(teacher.clone());

    let mut course = Course::new("Rust 101", enroll_type, access_key.map(str::to_string));
    course.teachers.push(teacher.id);
    store.save_course(&course).await.unwrap();

    let lecture = Lecture::new("Week 1");
    store.save_lecture(&lecture).await.unwrap();

    World {
        store,
        assets: FileAssets::new(files),
        teacher,
        course,
        lecture,
    }
}

pub fn student(uid: &str, first: &str, last: &str) -> User {
    User::new(uid, first, last, Role::Student)
}

pub fn fields(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("fields must be an object"),
    }
}
