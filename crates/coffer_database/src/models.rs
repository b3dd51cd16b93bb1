//! Row types for the Coffer tables.

use crate::schema::{content_nodes, object_content_info, store_properties, stores};
use diesel::prelude::*;
use uuid::Uuid;

/// A configured store.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = stores)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoreRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub backend: String,
}

/// One property of a store.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = store_properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StorePropertyRow {
    pub store_id: i64,
    pub key: String,
    pub value: String,
}

/// Repository node assigned to an object.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = content_nodes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContentNodeRow {
    pub object_id: i64,
    pub node_id: String,
}

/// File name and length recorded for an object.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = object_content_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContentInfoRow {
    pub object_id: i64,
    pub type_id: i64,
    pub file_name: String,
    pub file_length: i64,
}
