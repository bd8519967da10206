use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration as Days;
use dsr::core::{Clock, Skill, SkillStatus};
use dsr::engine::Decision;
use dsr::storage::{Database, SkillStore};
use dsr::test_utils::{Backend, EngineFixture};

#[test]
fn reuse_and_sweep_never_both_win() {
    for backend in Backend::ALL {
        for round in 0..20 {
            let fx = Arc::new(EngineFixture::new(backend));
            let context = EngineFixture::context("db", &[("redis", "7.2.4")], &["pubsub"]);
            let skill = fx.engine.record(&context, None, 0).unwrap();
            fx.clock.advance(Days::days(181));

            let barrier = Arc::new(Barrier::new(2));
            let reuse = {
                let fx = Arc::clone(&fx);
                let barrier = Arc::clone(&barrier);
                let context = context.clone();
                thread::spawn(move || {
                    barrier.wait();
                    fx.engine.decide(&context).unwrap()
                })
            };
            let sweep = {
                let fx = Arc::clone(&fx);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    fx.archival.sweep().unwrap()
                })
            };

            let decision = reuse.join().unwrap();
            let report = sweep.join().unwrap();
            let stored = fx.store.get_by_id(&skill.id).unwrap().unwrap();

            match decision {
                Decision::Reuse(_) => {
                    assert_eq!(stored.status, SkillStatus::Active, "{backend:?} round {round}");
                    assert_eq!(report.archived, 0, "{backend:?} round {round}");
                    assert_eq!(stored.generation_count, 2);
                }
                Decision::RestoreThenReuse(_) => {
                    assert_eq!(stored.status, SkillStatus::Archived, "{backend:?} round {round}");
                    assert_eq!(report.archived, 1);
                    assert_eq!(stored.generation_count, 1);
                }
                Decision::Regenerate { .. } => panic!("{backend:?}: unexpected regenerate"),
            }
        }
    }
}

#[test]
fn concurrent_reuses_each_count_once() {
    const CALLERS: usize = 12;

    for backend in Backend::ALL {
        let fx = Arc::new(EngineFixture::new(backend));
        let context = EngineFixture::context("frontend", &[("react", "19.0.0")], &[]);
        let skill = fx.engine.record(&context, None, 0).unwrap();
        fx.clock.advance(Days::minutes(1));

        let barrier = Arc::new(Barrier::new(CALLERS));
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let fx = Arc::clone(&fx);
                let barrier = Arc::clone(&barrier);
                let context = context.clone();
                thread::spawn(move || {
                    barrier.wait();
                    fx.engine.decide(&context).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.join().unwrap(), Decision::Reuse(_)));
        }
        let stored = fx.store.get_by_id(&skill.id).unwrap().unwrap();
        assert_eq!(stored.generation_count, 1 + CALLERS as u64, "{backend:?}");
        assert_eq!(fx.metrics.snapshot().reuse_count, CALLERS as u64);
    }
}

#[test]
fn separate_connections_agree_on_a_single_winner() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("shared.db");
    let seed = Database::open(&path).unwrap();
    let context = EngineFixture::context("db", &[("postgres", "16.2")], &[]);
    let skill = Skill::new_generation(&context, None, 0, chrono::Utc::now());
    seed.put(&skill).unwrap();
    drop(seed);

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            let id = skill.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                barrier.wait();
                db.compare_and_set_status(
                    &id,
                    SkillStatus::Active,
                    SkillStatus::Archived,
                    chrono::Utc::now(),
                )
                .unwrap()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);

    let db = Database::open(&path).unwrap();
    let events = db.events(&skill.id).unwrap();
    assert_eq!(events.len(), 2, "one insert and one archival");
}

#[test]
fn sweep_spares_recently_used_skills() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = EngineFixture::context("db", &[("redis", "7.2.4")], &[]);
        let skill = fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(179));
        fx.engine.decide(&context).unwrap();
        fx.clock.advance(Days::days(179));

        assert_eq!(fx.archival.sweep().unwrap().archived, 0, "{backend:?}");
        let stored = fx.store.get_by_id(&skill.id).unwrap().unwrap();
        assert_eq!(stored.status, SkillStatus::Active);
        assert!(fx.clock.now() - stored.last_activity() < Days::days(180));
    }
}
