use std::fmt::Display;

use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::tokens;

#[derive(
    Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, diesel_derive_enum::DbEnum,
)]
#[ExistingTypePath = "crate::schema::sql_types::TokenKind"]
pub enum TokenKindDb {
    Access,
    Reward,
}

impl Display for TokenKindDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKindDb::Access => write!(f, "access"),
            TokenKindDb::Reward => write!(f, "reward"),
        }
    }
}

#[derive(Debug, Serialize, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenDb {
    pub id: i32,
    pub name: String,
    pub kind: Option<TokenKindDb>,
    pub long_name: Option<String>,
    pub issuer: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub thumb_url: Option<String>,
    pub total_issued: i64,
    pub divisible: bool,
    pub locked: bool,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Insertable, Clone)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenInsertDb {
    pub name: String,
    pub kind: Option<TokenKindDb>,
    pub long_name: Option<String>,
    pub issuer: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub thumb_url: Option<String>,
    pub total_issued: i64,
    pub divisible: bool,
    pub locked: bool,
}
