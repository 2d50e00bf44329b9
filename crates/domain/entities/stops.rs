use diesel::prelude::*;

use crate::infra::db::postgres::schema::stops;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = stops)]
pub struct StopEntity {
    pub id: i64,
    pub route_id: i64,
    pub name: String,
    pub stop_order: i32,
}
