use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, SqliteQueryBuilder, Table};

use crate::schema::{Feedbacks, Toilets};

/// CREATE TABLE IF NOT EXISTS toilets (
///     id TEXT PRIMARY KEY,
///     name TEXT NOT NULL,
///     location TEXT NOT NULL,
///     building TEXT,
///     floor TEXT,
///     created_at TEXT NOT NULL
/// )
pub fn create_toilets_table() -> String {
    Table::create()
        .table(Toilets::Table)
        .if_not_exists()
        .col(ColumnDef::new(Toilets::Id).string().primary_key())
        .col(ColumnDef::new(Toilets::Name).string().not_null())
        .col(ColumnDef::new(Toilets::Location).string().not_null())
        .col(ColumnDef::new(Toilets::Building).string())
        .col(ColumnDef::new(Toilets::Floor).string())
        .col(ColumnDef::new(Toilets::CreatedAt).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS feedbacks (
///     id TEXT PRIMARY KEY,
///     toilet_id TEXT NOT NULL REFERENCES toilets(id),
///     cleanliness_rating INTEGER NOT NULL,
///     water_available INTEGER NOT NULL DEFAULT 1,
///     soap_available INTEGER NOT NULL DEFAULT 1,
///     comments TEXT, name TEXT, mobile TEXT, extra_feedback TEXT,
///     photos TEXT NOT NULL DEFAULT '[]',
///     videos TEXT NOT NULL DEFAULT '[]',
///     ip_address TEXT, user_agent TEXT,
///     created_at TEXT NOT NULL
/// )
///
/// photos/videos hold JSON arrays of public URLs.
pub fn create_feedbacks_table() -> String {
    Table::create()
        .table(Feedbacks::Table)
        .if_not_exists()
        .col(ColumnDef::new(Feedbacks::Id).string().primary_key())
        .col(ColumnDef::new(Feedbacks::ToiletId).string().not_null())
        .col(
            ColumnDef::new(Feedbacks::CleanlinessRating)
                .integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(Feedbacks::WaterAvailable)
                .integer()
                .not_null()
                .default(1),
        )
        .col(
            ColumnDef::new(Feedbacks::SoapAvailable)
                .integer()
                .not_null()
                .default(1),
        )
        .col(ColumnDef::new(Feedbacks::Comments).text())
        .col(ColumnDef::new(Feedbacks::Name).string())
        .col(ColumnDef::new(Feedbacks::Mobile).string())
        .col(ColumnDef::new(Feedbacks::ExtraFeedback).text())
        .col(
            ColumnDef::new(Feedbacks::Photos)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(
            ColumnDef::new(Feedbacks::Videos)
                .text()
                .not_null()
                .default("[]"),
        )
        .col(ColumnDef::new(Feedbacks::IpAddress).string())
        .col(ColumnDef::new(Feedbacks::UserAgent).text())
        .col(ColumnDef::new(Feedbacks::CreatedAt).string().not_null())
        .foreign_key(
            ForeignKey::create()
                .from(Feedbacks::Table, Feedbacks::ToiletId)
                .to(Toilets::Table, Toilets::Id)
                .on_delete(ForeignKeyAction::Restrict),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_feedbacks_created_at ON feedbacks(created_at)
pub fn create_feedbacks_created_at_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_feedbacks_created_at")
        .table(Feedbacks::Table)
        .col(Feedbacks::CreatedAt)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_feedbacks_toilet_id ON feedbacks(toilet_id)
pub fn create_feedbacks_toilet_id_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_feedbacks_toilet_id")
        .table(Feedbacks::Table)
        .col(Feedbacks::ToiletId)
        .to_string(SqliteQueryBuilder)
}
