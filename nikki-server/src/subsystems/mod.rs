pub mod checkins;
pub mod entries;
pub mod media;

use chrono::Utc;
use nikki_core::models::instant;

/// Commit message for a diary change, e.g. `[diary] 2024-05-01T09:30:00.000Z add entry`.
pub fn commit_message(action: &str) -> String {
    format!("[diary] {} {}", instant::to_iso(&Utc::now()), action)
}
