pub mod backfill;
pub mod clean;
