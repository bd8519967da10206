//! Property tests for fingerprinting and lineage.

mod fingerprint;
mod generations;
