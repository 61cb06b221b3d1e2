use diesel::{query_builder::AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::players;

#[derive(Debug, Serialize, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerDb {
    pub id: i32,
    pub address: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub rewards_total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub processed_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Insertable, Clone)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerInsertDb {
    pub address: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize, AsChangeset, Clone)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PlayerProfileUpdateDb {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
