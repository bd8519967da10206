//! Engine, store and archival behavior against both store backends.

mod lifecycle;
mod races;
mod scenarios;
