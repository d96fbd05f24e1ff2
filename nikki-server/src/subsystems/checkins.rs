use chrono::{DateTime, NaiveDate, Utc};
use nikki_core::models::offset_in_range;
use nikki_core::{CheckIn, DiaryError};

use crate::context::DiaryContext;
use crate::subsystems::commit_message;

#[derive(Debug, PartialEq)]
pub enum CheckInOutcome {
    Recorded { checkins: Vec<CheckIn> },
    AlreadyCheckedIn { day: NaiveDate },
}

/// Record a study check-in for the client's local day.
///
/// `utc_offset_minutes` is minutes east of UTC (JST is `540`). A second
/// check-in on the same local day is reported, not written.
pub async fn check_in(
    ctx: &DiaryContext,
    password: Option<&str>,
    at: Option<DateTime<Utc>>,
    utc_offset_minutes: i32,
) -> Result<CheckInOutcome, DiaryError> {
    ctx.auth.require(password)?;

    if !offset_in_range(utc_offset_minutes) {
        return Err(DiaryError::InvalidRequest(format!(
            "utc offset {utc_offset_minutes} minutes is out of range"
        )));
    }

    let at = at.unwrap_or_else(Utc::now);
    match ctx
        .rmw
        .mutate(&ctx.document_key, &commit_message("check in"), |doc| {
            doc.with_checkin(at, utc_offset_minutes)
        })
        .await
    {
        Ok(committed) => Ok(CheckInOutcome::Recorded {
            checkins: committed.document.checkins,
        }),
        Err(DiaryError::AlreadyCheckedIn(day)) => {
            tracing::info!(day = %day, "Already checked in today");
            Ok(CheckInOutcome::AlreadyCheckedIn { day })
        }
        Err(e) => Err(e),
    }
}
