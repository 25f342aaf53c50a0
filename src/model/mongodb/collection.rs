use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Branch, EvaluationRequest, Question, Settings, User};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for EvaluationRequest {
    const NAME: &'static str = "evaluation_requests";
}

// Owned by the question bank; we only read them and update statuses.
impl MongoCollection for Question {
    const NAME: &'static str = "questions";
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Branch {
    const NAME: &'static str = "branches";
}

impl MongoCollection for Settings {
    const NAME: &'static str = "settings";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let requests = Coll::<EvaluationRequest>::from_db(db);

    // Group lookups.
    let group_index = IndexModel::builder()
        .keys(doc! {"question_id": 1, "code": 1})
        .build();
    requests.create_index(group_index, None).await?;

    // An elector appears at most once per group.
    let unique = IndexOptions::builder().unique(true).build();
    let membership_index = IndexModel::builder()
        .keys(doc! {"code": 1, "elector_id": 1})
        .options(unique)
        .build();
    requests.create_index(membership_index, None).await?;

    // Per-elector listings.
    let elector_index = IndexModel::builder()
        .keys(doc! {"elector_id": 1, "created_at": -1})
        .build();
    requests.create_index(elector_index, None).await?;

    Ok(())
}

/// Insert the initial settings record if there is none yet.
///
/// This operation is idempotent.
pub async fn ensure_settings_exist(settings: &Coll<Settings>) -> Result<(), DbError> {
    if settings.count_documents(None, None).await? == 0 {
        debug!("No settings record found, inserting defaults");
        settings.insert_one(Settings::initial(), None).await?;
    }
    Ok(())
}
