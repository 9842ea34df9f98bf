//! SQL builders for the SQLite data service backend.
//!
//! Every function returns a fully rendered statement string; values are
//! inlined and escaped by sea-query.

pub mod ddl;
pub mod feedbacks;
pub mod toilets;
