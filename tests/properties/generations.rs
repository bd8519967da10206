use std::collections::HashMap;

use chrono::Duration as Days;
use dsr::core::{SkillId, SkillStatus};
use dsr::engine::Decision;
use dsr::storage::{SkillFilter, SkillStore};
use dsr::test_utils::{Backend, EngineFixture};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    /// Ask for a skill with this redis minor version
    Request(u8),
    /// Let this many days pass
    Idle(u16),
    Sweep,
    RestoreAll,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..3).prop_map(Step::Request),
        2 => (1u16..250).prop_map(Step::Idle),
        1 => Just(Step::Sweep),
        1 => Just(Step::RestoreAll),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn generations_never_decrease_and_records_never_vanish(
        steps in prop::collection::vec(step(), 1..30)
    ) {
        let fx = EngineFixture::new(Backend::Memory);
        let mut seen: HashMap<SkillId, u64> = HashMap::new();

        for step in steps {
            match step {
                Step::Request(minor) => {
                    let version = format!("7.{minor}");
                    let context = EngineFixture::context("db", &[("redis", version.as_str())], &[]);
                    match fx.engine.decide(&context).unwrap() {
                        Decision::Regenerate { prior } => {
                            let prior_id = prior.as_ref().map(|skill| skill.id.clone());
                            let skill = fx.engine.record(&context, prior_id.as_ref(), 0).unwrap();
                            if let Some(prior) = prior {
                                prop_assert!(skill.generation_count > prior.generation_count);
                            }
                        }
                        Decision::RestoreThenReuse(skill) => {
                            fx.archival.restore(&skill.id).unwrap();
                        }
                        Decision::Reuse(_) => {}
                    }
                    fx.clock.advance(Days::seconds(1));
                }
                Step::Idle(days) => fx.clock.advance(Days::days(i64::from(days))),
                Step::Sweep => {
                    fx.archival.sweep().unwrap();
                }
                Step::RestoreAll => {
                    for skill in fx.store.list(&SkillFilter::with_status(SkillStatus::Archived)).unwrap() {
                        fx.archival.restore(&skill.id).unwrap();
                    }
                }
            }

            let all = fx.store.list(&SkillFilter::all()).unwrap();
            prop_assert!(all.len() >= seen.len());
            for skill in all {
                let previous = seen.insert(skill.id.clone(), skill.generation_count);
                if let Some(previous) = previous {
                    prop_assert!(skill.generation_count >= previous);
                }
            }
        }
    }
}
