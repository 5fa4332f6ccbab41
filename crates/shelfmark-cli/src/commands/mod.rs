pub mod add;
pub mod common;
pub mod completions;
pub mod dedup;
pub mod delete;
pub mod libraries;
pub mod list;
pub mod show;
pub mod sync;
