//! Deterministic cache keys.
//!
//! Every per-person key starts with `p{id}/`, so a single prefix sweep
//! covers all parameter combinations for that person.

use chrono::NaiveDate;

pub fn person(id: u64) -> String {
    format!("p{id}/person")
}

pub fn series(id: u64, start: NaiveDate, end: NaiveDate, limit: u32) -> String {
    format!("p{id}/series/{start}/{end}/{limit}")
}

pub fn stats(id: u64, start: NaiveDate, end: NaiveDate, limit: u32) -> String {
    format!("p{id}/stats/{start}/{end}/{limit}")
}

pub fn people() -> String {
    "people/all".into()
}

pub fn person_prefix(id: u64) -> String {
    format!("p{id}/")
}

pub fn people_prefix() -> String {
    "people/".into()
}
