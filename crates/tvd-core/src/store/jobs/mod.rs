//! Persistent job queue rows.

mod read;
mod write;
