use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Queryable, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}
