//! In-process skill store.
//!
//! Records live in an arena keyed by id, each behind its own mutex so
//! guarded updates on different skills never contend. The arena lock is only
//! taken for writing on insert. Lock order is arena, then record, then the
//! event log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::{check_lineage, SkillEvent, SkillEventKind, SkillFilter, SkillStore, SkillUpdate};
use crate::context::{normalize_domain, ContextHash};
use crate::core::{Skill, SkillId, SkillStatus};
use crate::error::{DsrError, Result};

#[derive(Default)]
struct Arena {
    records: HashMap<SkillId, Arc<Mutex<Skill>>>,
    /// Insertion order, for stable listing
    order: Vec<SkillId>,
    by_hash: HashMap<(String, ContextHash), Vec<(DateTime<Utc>, SkillId)>>,
}

#[derive(Default)]
struct EventLog {
    next_seq: u64,
    entries: Vec<SkillEvent>,
}

impl EventLog {
    fn append(
        &mut self,
        skill: &Skill,
        kind: SkillEventKind,
        from: Option<SkillStatus>,
        at: DateTime<Utc>,
    ) {
        self.next_seq += 1;
        self.entries.push(SkillEvent {
            seq: self.next_seq,
            skill_id: skill.id.clone(),
            kind,
            from_status: from,
            to_status: skill.status,
            at,
            generation_count: skill.generation_count,
        });
    }
}

/// Thread-safe in-memory [`SkillStore`].
#[derive(Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
    events: Mutex<EventLog>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("skills", &self.arena.read().order.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &SkillId) -> Option<Arc<Mutex<Skill>>> {
        self.arena.read().records.get(id).cloned()
    }
}

impl SkillStore for MemoryStore {
    fn put(&self, skill: &Skill) -> Result<()> {
        let mut arena = self.arena.write();
        if arena.records.contains_key(&skill.id) {
            return Err(DsrError::Conflict(skill.id.to_string()));
        }
        let ancestor = skill
            .previous_version_id
            .as_ref()
            .and_then(|prior| arena.records.get(prior))
            .map(|record| record.lock().clone());
        check_lineage(skill, ancestor.as_ref())?;

        arena
            .by_hash
            .entry((skill.domain.clone(), skill.context_hash))
            .or_default()
            .push((skill.created_at, skill.id.clone()));
        arena.order.push(skill.id.clone());
        arena
            .records
            .insert(skill.id.clone(), Arc::new(Mutex::new(skill.clone())));

        self.events
            .lock()
            .append(skill, SkillEventKind::Created, None, skill.created_at);
        Ok(())
    }

    fn get_by_id(&self, id: &SkillId) -> Result<Option<Skill>> {
        Ok(self.record(id).map(|record| record.lock().clone()))
    }

    fn get_by_hash(&self, domain: &str, hash: &ContextHash) -> Result<Option<Skill>> {
        let arena = self.arena.read();
        let newest = arena
            .by_hash
            .get(&(normalize_domain(domain), *hash))
            .and_then(|entries| {
                // max_by_key keeps the last maximum, so ties go to the later insert
                entries.iter().max_by_key(|(created_at, _)| *created_at)
            })
            .and_then(|(_, id)| arena.records.get(id))
            .map(|record| record.lock().clone());
        Ok(newest)
    }

    fn list(&self, filter: &SkillFilter) -> Result<Vec<Skill>> {
        let arena = self.arena.read();
        let mut skills: Vec<Skill> = arena
            .order
            .iter()
            .filter_map(|id| arena.records.get(id))
            .map(|record| record.lock().clone())
            .filter(|skill| filter.matches(skill))
            .collect();
        skills.sort_by_key(|skill| skill.created_at);
        Ok(skills)
    }

    fn guarded_update(&self, id: &SkillId, update: &SkillUpdate) -> Result<bool> {
        let record = self
            .record(id)
            .ok_or_else(|| DsrError::NotFound(id.to_string()))?;
        let mut skill = record.lock();
        if !update.guards_match(&skill) {
            return Ok(false);
        }
        update.apply_to(&mut skill);
        self.events
            .lock()
            .append(&skill, update.event, Some(update.expected_status), update.at);
        Ok(true)
    }

    fn events(&self, id: &SkillId) -> Result<Vec<SkillEvent>> {
        Ok(self
            .events
            .lock()
            .entries
            .iter()
            .filter(|event| &event.skill_id == id)
            .cloned()
            .collect())
    }
}
