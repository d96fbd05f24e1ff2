pub mod document;
pub mod entry;
pub mod instant;

pub use document::{offset_in_range, CheckIn, DiaryDocument};
pub use entry::DiaryEntry;
