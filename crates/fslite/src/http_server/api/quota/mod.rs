//! Per-user and per-group quota slices of a volume.

pub mod group;
pub mod user;
