//! Row types mapped from SQL queries.

pub mod job;
