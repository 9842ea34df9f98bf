use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use crate::locations::CatalogLocation;
use crate::schema::Toilets;

/// INSERT INTO toilets (id, name, location, building, floor, created_at)
/// VALUES (...) ON CONFLICT (id) DO NOTHING
///
/// Re-seeding leaves existing rows and their created_at untouched.
pub fn insert_if_absent(location: &CatalogLocation, created_at: &str) -> String {
    Query::insert()
        .into_table(Toilets::Table)
        .columns([
            Toilets::Id,
            Toilets::Name,
            Toilets::Location,
            Toilets::Building,
            Toilets::Floor,
            Toilets::CreatedAt,
        ])
        .values_panic([
            location.id.as_str().into(),
            location.name.as_str().into(),
            location.description().into(),
            location.building.as_str().into(),
            location.floor.as_str().into(),
            created_at.into(),
        ])
        .on_conflict(OnConflict::column(Toilets::Id).do_nothing().to_owned())
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, name, location, building, floor, created_at FROM toilets WHERE id = ?
pub fn select_by_id(id: &str) -> String {
    Query::select()
        .columns([
            Toilets::Id,
            Toilets::Name,
            Toilets::Location,
            Toilets::Building,
            Toilets::Floor,
            Toilets::CreatedAt,
        ])
        .from(Toilets::Table)
        .and_where(Expr::col(Toilets::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}
