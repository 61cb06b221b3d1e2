use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::balances;

#[derive(Debug, Serialize, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = balances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BalanceDb {
    pub id: i32,
    pub player_id: i32,
    pub token_id: i32,
    pub quantity: i64,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = balances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BalanceInsertDb {
    pub player_id: i32,
    pub token_id: i32,
    pub quantity: i64,
}
