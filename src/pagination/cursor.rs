//! Cursor handling for incremental exports

use super::types::{IncrementalPage, NextPage};
use url::Url;

/// Read the `start_time` query parameter of a continuation URL
pub fn next_start_time(next_page: &str) -> Option<i64> {
    let url = Url::parse(next_page).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "start_time")
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Decide the next step after `page`, honouring an optional stop time
///
/// `end_of_stream` wins over `next_page`. A continuation whose `start_time`
/// cannot be read is followed.
pub fn next_page(page: &IncrementalPage, stop_time: Option<i64>) -> NextPage {
    if page.end_of_stream {
        return NextPage::EndOfStream {
            end_time: page.end_time,
        };
    }

    let Some(ref next) = page.next_page else {
        return NextPage::Done;
    };

    if let Some(stop) = stop_time {
        if let Some(start) = next_start_time(next) {
            if start > stop {
                return NextPage::StopBeforeTarget {
                    next_start_time: start,
                };
            }
        }
    }

    NextPage::Follow(next.clone())
}
