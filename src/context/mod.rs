//! Request context and fingerprinting.

pub mod fingerprint;
pub mod request;

pub use fingerprint::{ContextHash, fingerprint, normalize_domain};
pub use request::SkillContext;
