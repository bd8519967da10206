//! Core skill types and logic

pub mod clock;
pub mod skill;

pub use clock::{Clock, ManualClock, SystemClock};
pub use skill::{Skill, SkillId, SkillStatus};
