use bson::{doc, Bson, Document};
use mongodb::options::ReplaceOptions;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::Store;
use crate::data::course::{Course, EnrollType, COURSE_COLLECTION_NAME};
use crate::data::lecture::{Lecture, LECTURE_COLLECTION_NAME};
use crate::data::unit::{ContentUnit, UNIT_COLLECTION_NAME};
use crate::data::user::{User, USER_COLLECTION_NAME};
use crate::data::whitelist::{WhitelistEntry, WHITELIST_COLLECTION_NAME};
use crate::error::StoreError;

pub mod filter {
    use bson::spec::BinarySubtype;
    use bson::{doc, Bson, Document};
    use uuid::Uuid;

    /// Document id as written by `uuid_1_as_binary`.
    #[inline]
    pub fn uuid(id: Uuid) -> Bson {
        Bson::Binary(bson::Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        })
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    #[inline]
    pub fn by_course(course: Uuid) -> Document {
        doc! { "_course": uuid(course) }
    }
}

/// Uuids stored inside arrays go through plain serde, so they are matched the same way.
fn member(id: &Uuid) -> Result<Bson, StoreError> {
    Ok(bson::to_bson(id)?)
}

fn members(ids: &[Uuid]) -> Result<Vec<Bson>, StoreError> {
    ids.iter().map(member).collect()
}

async fn find_one<T: DeserializeOwned>(
    db: &Database,
    collection: &str,
    filter: Document,
    kind: &'static str,
    id: Uuid,
) -> Result<T, StoreError> {
    match db
        .collection::<Document>(collection)
        .find_one(filter, None)
        .await?
    {
        Some(document) => Ok(bson::from_document(document)?),
        None => Err(StoreError::NotFound(kind, id)),
    }
}

async fn upsert<T: Serialize>(
    db: &Database,
    collection: &str,
    id: Uuid,
    value: &T,
) -> Result<(), StoreError> {
    db.collection::<Document>(collection)
        .replace_one(
            filter::by_id(id),
            bson::to_document(value)?,
            ReplaceOptions::builder().upsert(true).build(),
        )
        .await?;
    Ok(())
}

async fn update_course(db: &Database, course: Uuid, update: Document) -> Result<u64, StoreError> {
    let result = db
        .collection::<Document>(COURSE_COLLECTION_NAME)
        .update_one(filter::by_id(course), update, None)
        .await?;

    if result.matched_count == 0 {
        return Err(StoreError::NotFound("course", course));
    }
    Ok(result.modified_count)
}

impl Store for Database {
    async fn find_course_by_id(&self, id: Uuid) -> Result<Course, StoreError> {
        find_one(self, COURSE_COLLECTION_NAME, filter::by_id(id), "course", id).await
    }

    async fn save_course(&self, course: &Course) -> Result<(), StoreError> {
        upsert(self, COURSE_COLLECTION_NAME, course.id, course).await
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .collection::<Document>(COURSE_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound("course", id));
        }

        let removed = self
            .collection::<Document>(WHITELIST_COLLECTION_NAME)
            .delete_many(filter::by_course(id), None)
            .await?;
        tracing::debug!(
            "Removed {} whitelist entries of course {}",
            removed.deleted_count,
            id
        );

        Ok(())
    }

    async fn set_enroll_policy(
        &self,
        course: Uuid,
        enroll_type: EnrollType,
        access_key: Option<String>,
    ) -> Result<(), StoreError> {
        let update = doc! {
            "$set": {
                "enroll_type": bson::to_bson(&enroll_type)?,
                "access_key": bson::to_bson(&access_key)?,
            }
        };
        update_course(self, course, update).await.map(|_| ())
    }

    async fn add_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError> {
        let update = doc! { "$addToSet": { "students": member(&user)? } };
        Ok(update_course(self, course, update).await? > 0)
    }

    async fn remove_student(&self, course: Uuid, user: Uuid) -> Result<bool, StoreError> {
        let update = doc! { "$pull": { "students": member(&user)? } };
        Ok(update_course(self, course, update).await? > 0)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        find_one(self, USER_COLLECTION_NAME, filter::by_id(id), "user", id).await
    }

    async fn find_users(&self) -> Result<Vec<User>, StoreError> {
        let documents: Vec<Document> = self
            .collection::<Document>(USER_COLLECTION_NAME)
            .find(None, None)
            .await?
            .try_collect()
            .await?;

        let mut users = Vec::with_capacity(documents.len());
        for document in documents {
            match bson::from_document::<User>(document) {
                Ok(user) => users.push(user),
                Err(_) => tracing::warn!("Unable to deserialize User document."),
            }
        }
        Ok(users)
    }

    async fn find_whitelist_entries(&self, course: Uuid) -> Result<Vec<WhitelistEntry>, StoreError> {
        let links = match self.find_course_by_id(course).await {
            Ok(it) => it.whitelist,
            Err(StoreError::NotFound(..)) => vec![],
            Err(e) => return Err(e),
        };

        let documents: Vec<Document> = self
            .collection::<Document>(WHITELIST_COLLECTION_NAME)
            .find(filter::by_course(course), None)
            .await?
            .try_collect()
            .await?;

        let mut entries = documents
            .into_iter()
            .map(|it| bson::from_document(it).map_err(StoreError::from))
            .collect::<Result<Vec<WhitelistEntry>, StoreError>>()?;
        super::sort_by_links(&mut entries, &links);
        Ok(entries)
    }

    async fn save_whitelist_entries(&self, entries: &[WhitelistEntry]) -> Result<(), StoreError> {
        for entry in entries {
            upsert(self, WHITELIST_COLLECTION_NAME, entry.id, entry).await?;
        }
        Ok(())
    }

    async fn link_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let update = doc! { "$addToSet": { "whitelist": { "$each": members(ids)? } } };
        update_course(self, course, update).await.map(|_| ())
    }

    async fn delete_whitelist_entries(&self, course: Uuid, ids: &[Uuid]) -> Result<(), StoreError> {
        let update = doc! { "$pull": { "whitelist": { "$in": members(ids)? } } };
        update_course(self, course, update).await?;

        let ids: Vec<Bson> = ids.iter().map(|id| filter::uuid(*id)).collect();
        let mut query = filter::by_course(course);
        query.insert("_id", doc! { "$in": ids });
        self.collection::<Document>(WHITELIST_COLLECTION_NAME)
            .delete_many(query, None)
            .await?;
        Ok(())
    }

    async fn find_unit_by_id(&self, id: Uuid) -> Result<ContentUnit, StoreError> {
        find_one(self, UNIT_COLLECTION_NAME, filter::by_id(id), "unit", id).await
    }

    async fn save_unit(&self, unit: &ContentUnit) -> Result<(), StoreError> {
        upsert(self, UNIT_COLLECTION_NAME, unit.id, unit).await
    }

    async fn remove_unit(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .collection::<Document>(UNIT_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound("unit", id));
        }
        Ok(())
    }

    async fn find_lecture_by_id(&self, id: Uuid) -> Result<Lecture, StoreError> {
        find_one(self, LECTURE_COLLECTION_NAME, filter::by_id(id), "lecture", id).await
    }

    async fn find_lecture_by_unit(&self, unit: Uuid) -> Result<Lecture, StoreError> {
        let query = doc! { "units": member(&unit)? };
        find_one(self, LECTURE_COLLECTION_NAME, query, "lecture", unit).await
    }

    async fn save_lecture(&self, lecture: &Lecture) -> Result<(), StoreError> {
        upsert(self, LECTURE_COLLECTION_NAME, lecture.id, lecture).await
    }
}
