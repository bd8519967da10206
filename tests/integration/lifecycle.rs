use chrono::Duration as Days;
use dsr::DsrError;
use dsr::core::{Clock, SkillStatus};
use dsr::engine::Decision;
use dsr::storage::{SkillEventKind, SkillFilter, SkillStore};
use dsr::test_utils::{Backend, EngineFixture};

#[test]
fn restored_skill_is_reused_not_regenerated() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = EngineFixture::context("ci", &[("actions", "4")], &["caching"]);
        let skill = fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(200));
        fx.archival.sweep().unwrap();

        let restored = fx.archival.restore(&skill.id).unwrap();
        assert_eq!(restored.status, SkillStatus::Active);
        assert_eq!(restored.last_used_at, Some(fx.clock.now()));

        // Verification is still 200 days old, so the clean checker is asked once.
        let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected reuse after restore");
        };
        assert_eq!(reused.id, skill.id);
        assert_eq!(reused.status, SkillStatus::Active);
    }
}

#[test]
fn restore_twice_is_invalid_state() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = EngineFixture::context("ci", &[], &[]);
        let skill = fx.engine.record(&context, None, 0).unwrap();
        fx.clock.advance(Days::days(181));
        fx.archival.sweep().unwrap();

        fx.archival.restore(&skill.id).unwrap();
        let err = fx.archival.restore(&skill.id).unwrap_err();
        assert!(
            matches!(
                err,
                DsrError::InvalidState {
                    actual: SkillStatus::Active,
                    ..
                }
            ),
            "{backend:?}: {err}"
        );
    }
}

#[test]
fn sweeps_never_delete_records() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let mut ids = Vec::new();
        for (i, domain) in ["db", "frontend", "infra", "ml"].into_iter().enumerate() {
            let context = EngineFixture::context(domain, &[("tool", i.to_string().as_str())], &[]);
            ids.push(fx.engine.record(&context, None, 0).unwrap().id);
            fx.clock.advance(Days::days(60));
        }

        for _ in 0..5 {
            fx.clock.advance(Days::days(90));
            fx.archival.sweep().unwrap();
        }

        for id in &ids {
            let skill = fx.store.get_by_id(id).unwrap().expect("record survives sweeps");
            assert_eq!(skill.status, SkillStatus::Archived, "{backend:?}");
        }
        assert_eq!(fx.store.list(&SkillFilter::all()).unwrap().len(), ids.len());
    }
}

#[test]
fn lineage_chain_and_generations_only_grow() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let mut prior = None;
        let mut last_generation = 0;

        for minor in 0..4 {
            let version = format!("1.{minor}.0");
            let context = EngineFixture::context("api", &[("axum", version.as_str())], &[]);
            let decision = fx.engine.decide(&context).unwrap();
            let prior_id = match decision {
                Decision::Regenerate { prior } => prior.map(|skill| skill.id),
                other => panic!("{backend:?}: expected regenerate, got {}", other.kind()),
            };
            assert_eq!(prior_id, prior);

            let skill = fx.engine.record(&context, prior_id.as_ref(), 0).unwrap();
            assert!(skill.generation_count > last_generation);
            last_generation = skill.generation_count;

            fx.clock.advance(Days::minutes(10));
            let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
                panic!("{backend:?}: expected reuse");
            };
            assert!(reused.generation_count > last_generation);
            last_generation = reused.generation_count;

            prior = Some(skill.id);
            fx.clock.advance(Days::minutes(10));
        }

        let newest = prior.unwrap();
        let chain = fx.store.history(&newest).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0].id, newest);
        assert!(chain.last().unwrap().previous_version_id.is_none());
        for pair in chain.windows(2) {
            assert_eq!(pair[0].previous_version_id.as_ref(), Some(&pair[1].id));
            assert!(pair[0].created_at > pair[1].created_at);
        }
    }
}

#[test]
fn audit_log_follows_the_lifecycle() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = EngineFixture::context("db", &[("redis", "7")], &[]);
        let skill = fx.engine.record(&context, None, 0).unwrap();
        fx.clock.advance(Days::days(1));
        fx.engine.decide(&context).unwrap();
        fx.clock.advance(Days::days(181));
        fx.archival.sweep().unwrap();
        fx.archival.restore(&skill.id).unwrap();

        let kinds: Vec<_> = fx
            .store
            .events(&skill.id)
            .unwrap()
            .into_iter()
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SkillEventKind::Created,
                SkillEventKind::Reused,
                SkillEventKind::Archived,
                SkillEventKind::Restored,
            ],
            "{backend:?}"
        );
    }
}

#[test]
fn stats_count_due_revalidations() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        fx.engine
            .record(&EngineFixture::context("db", &[], &[]), None, 100)
            .unwrap();
        fx.clock.advance(Days::days(40));
        fx.engine
            .record(&EngineFixture::context("web", &[], &[]), None, 50)
            .unwrap();

        let stats = fx.store.stats(fx.clock.now() - Days::days(30)).unwrap();
        assert_eq!(stats.total, 2, "{backend:?}");
        assert_eq!(stats.total_size_bytes, 150);
        assert_eq!(stats.due_for_revalidation, 1);
        assert_eq!(stats.by_domain.get("db"), Some(&1));
        assert_eq!(stats.by_status.get("active"), Some(&2));
    }
}
