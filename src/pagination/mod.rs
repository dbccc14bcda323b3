//! Pagination module
//!
//! Decodes incremental export pages and decides whether to follow the
//! `next_page` cursor.
//!
//! # Overview
//!
//! A page either ends the stream (`end_of_stream` with an authoritative
//! `end_time`), points at the next page, or neither. With a stop time, a
//! continuation starting after it is not requested at all.

mod cursor;
mod types;

pub use cursor::{next_page, next_start_time};
pub use types::{IncrementalPage, NextPage};
