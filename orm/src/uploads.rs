use std::fmt::Display;

use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::uploads;

#[derive(
    Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, diesel_derive_enum::DbEnum,
)]
#[ExistingTypePath = "crate::schema::sql_types::UploadStatus"]
pub enum UploadStatusDb {
    Pending,
    Accepted,
    Rejected,
}

impl Display for UploadStatusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadStatusDb::Pending => write!(f, "pending"),
            UploadStatusDb::Accepted => write!(f, "accepted"),
            UploadStatusDb::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Serialize, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = uploads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UploadDb {
    pub id: i32,
    pub player_id: i32,
    pub new_image_url: String,
    pub old_image_url: String,
    pub status: UploadStatusDb,
    pub created_at: chrono::NaiveDateTime,
    pub moderated_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = uploads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UploadInsertDb {
    pub player_id: i32,
    pub new_image_url: String,
    pub old_image_url: String,
}
