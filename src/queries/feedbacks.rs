use sea_query::{Alias, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use crate::constants::LOW_RATING_THRESHOLD;
use crate::model::{FeedbackCategory, FeedbackQuery};
use crate::schema::{Feedbacks, Toilets};

/// Every stored feedbacks column, in table order
pub const FEEDBACK_COLUMNS: [Feedbacks; 14] = [
    Feedbacks::Id,
    Feedbacks::ToiletId,
    Feedbacks::CleanlinessRating,
    Feedbacks::WaterAvailable,
    Feedbacks::SoapAvailable,
    Feedbacks::Comments,
    Feedbacks::Name,
    Feedbacks::Mobile,
    Feedbacks::ExtraFeedback,
    Feedbacks::Photos,
    Feedbacks::Videos,
    Feedbacks::IpAddress,
    Feedbacks::UserAgent,
    Feedbacks::CreatedAt,
];

/// Values of one feedbacks row, already converted to their stored form
pub struct FeedbackRow<'a> {
    pub id: &'a str,
    pub toilet_id: &'a str,
    pub rating: i32,
    pub water_available: bool,
    pub soap_available: bool,
    pub comments: Option<&'a str>,
    pub name: Option<&'a str>,
    pub mobile: Option<&'a str>,
    pub extra_feedback: Option<&'a str>,
    pub photos_json: &'a str,
    pub videos_json: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub created_at: &'a str,
}

/// INSERT INTO feedbacks (...all columns...) VALUES (...)
pub fn insert(row: &FeedbackRow<'_>) -> String {
    Query::insert()
        .into_table(Feedbacks::Table)
        .columns([
            Feedbacks::Id,
            Feedbacks::ToiletId,
            Feedbacks::CleanlinessRating,
            Feedbacks::WaterAvailable,
            Feedbacks::SoapAvailable,
            Feedbacks::Comments,
            Feedbacks::Name,
            Feedbacks::Mobile,
            Feedbacks::ExtraFeedback,
            Feedbacks::Photos,
            Feedbacks::Videos,
            Feedbacks::IpAddress,
            Feedbacks::UserAgent,
            Feedbacks::CreatedAt,
        ])
        .values_panic([
            row.id.into(),
            row.toilet_id.into(),
            row.rating.into(),
            (row.water_available as i32).into(),
            (row.soap_available as i32).into(),
            row.comments.map(str::to_string).into(),
            row.name.map(str::to_string).into(),
            row.mobile.map(str::to_string).into(),
            row.extra_feedback.map(str::to_string).into(),
            row.photos_json.into(),
            row.videos_json.into(),
            row.ip_address.map(str::to_string).into(),
            row.user_agent.map(str::to_string).into(),
            row.created_at.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// Category filter only. Text search needs Unicode case folding, which
/// SQLite's `lower()` lacks, so it runs over the fetched rows instead.
fn apply_category(select: &mut SelectStatement, query: &FeedbackQuery) {
    match query.category {
        FeedbackCategory::All => {}
        FeedbackCategory::LowRating => {
            select.and_where(
                Expr::col((Feedbacks::Table, Feedbacks::CleanlinessRating))
                    .lte(LOW_RATING_THRESHOLD as i32),
            );
        }
        FeedbackCategory::NoWater => {
            select.and_where(Expr::col((Feedbacks::Table, Feedbacks::WaterAvailable)).eq(0));
        }
        FeedbackCategory::NoSoap => {
            select.and_where(Expr::col((Feedbacks::Table, Feedbacks::SoapAvailable)).eq(0));
        }
    }
}

/// SELECT feedbacks.*, toilets.name, toilets.location, toilets.building, toilets.floor
/// FROM feedbacks LEFT JOIN toilets ON feedbacks.toilet_id = toilets.id
/// WHERE <category>
/// ORDER BY feedbacks.created_at DESC, feedbacks.rowid DESC
pub fn select_with_location(query: &FeedbackQuery) -> String {
    let mut select = Query::select();
    select
        .columns(FEEDBACK_COLUMNS.map(|column| (Feedbacks::Table, column)))
        .expr_as(
            Expr::col((Toilets::Table, Toilets::Name)),
            Alias::new("toilet_name"),
        )
        .expr_as(
            Expr::col((Toilets::Table, Toilets::Location)),
            Alias::new("toilet_location"),
        )
        .expr_as(
            Expr::col((Toilets::Table, Toilets::Building)),
            Alias::new("toilet_building"),
        )
        .expr_as(
            Expr::col((Toilets::Table, Toilets::Floor)),
            Alias::new("toilet_floor"),
        )
        .from(Feedbacks::Table)
        .left_join(
            Toilets::Table,
            Expr::col((Feedbacks::Table, Feedbacks::ToiletId))
                .equals((Toilets::Table, Toilets::Id)),
        );

    apply_category(&mut select, query);

    select
        .order_by((Feedbacks::Table, Feedbacks::CreatedAt), Order::Desc)
        .order_by((Feedbacks::Table, Alias::new("rowid")), Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(id),
///        SUM(CASE WHEN cleanliness_rating <= 2 THEN 1 ELSE 0 END),
///        SUM(CASE WHEN water_available = 0 THEN 1 ELSE 0 END),
///        SUM(CASE WHEN soap_available = 0 THEN 1 ELSE 0 END)
/// FROM feedbacks
pub fn select_summary() -> String {
    Query::select()
        .expr(Func::count(Expr::col(Feedbacks::Id)))
        .expr(Func::sum(
            Expr::case(
                Expr::col(Feedbacks::CleanlinessRating).lte(LOW_RATING_THRESHOLD as i32),
                1,
            )
            .finally(0),
        ))
        .expr(Func::sum(
            Expr::case(Expr::col(Feedbacks::WaterAvailable).eq(0), 1).finally(0),
        ))
        .expr(Func::sum(
            Expr::case(Expr::col(Feedbacks::SoapAvailable).eq(0), 1).finally(0),
        ))
        .from(Feedbacks::Table)
        .to_string(SqliteQueryBuilder)
}
