use std::time::Duration;

use chrono::Duration as Days;
use dsr::core::{Clock, SkillStatus};
use dsr::engine::Decision;
use dsr::storage::SkillStore;
use dsr::test_utils::{Backend, EngineFixture, ScriptedChecker};

fn redis(version: &str) -> dsr::context::SkillContext {
    EngineFixture::context("db", &[("redis", version)], &["pubsub"])
}

#[test]
fn unchanged_context_is_reused_on_second_call() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = redis("7.2.4");

        assert_eq!(
            fx.engine.decide(&context).unwrap(),
            Decision::Regenerate { prior: None },
            "{backend:?}"
        );
        let created = fx.engine.record(&context, None, 512).unwrap();
        assert_eq!(created.generation_count, 1);

        fx.clock.advance(Days::hours(1));
        let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected reuse");
        };
        assert_eq!(reused.id, created.id);
        assert_eq!(reused.generation_count, 2);
        assert_eq!(reused.last_used_at, Some(fx.clock.now()));
        assert_eq!(fx.checker.calls().load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}

#[test]
fn version_bump_regenerates_with_prior() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let old = fx.engine.record(&redis("7.2.4"), None, 0).unwrap();
        fx.clock.advance(Days::minutes(5));

        let Decision::Regenerate { prior: Some(prior) } = fx.engine.decide(&redis("7.2.5")).unwrap()
        else {
            panic!("{backend:?}: expected regenerate with prior");
        };
        assert_eq!(prior.id, old.id);

        let next = fx.engine.record(&redis("7.2.5"), Some(&prior.id), 0).unwrap();
        assert_eq!(next.previous_version_id.as_ref(), Some(&old.id));
        assert_eq!(next.generation_count, 2);

        let untouched = fx.store.get_by_id(&old.id).unwrap().unwrap();
        assert_eq!(untouched.status, SkillStatus::Active);
        assert_eq!(untouched.generation_count, 1);
    }
}

#[test]
fn unrelated_tools_in_same_domain_regenerate_without_prior() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        fx.engine.record(&redis("7.2.4"), None, 0).unwrap();
        fx.clock.advance(Days::minutes(5));

        let postgres = EngineFixture::context("db", &[("postgres", "16")], &["indexes"]);
        assert_eq!(
            fx.engine.decide(&postgres).unwrap(),
            Decision::Regenerate { prior: None },
            "{backend:?}"
        );

        let recorded = fx.engine.record(&postgres, None, 0).unwrap();
        assert_eq!(recorded.generation_count, 1);
        assert!(recorded.previous_version_id.is_none());
        assert_eq!(fx.store.history(&recorded.id).unwrap().len(), 1);
    }
}

#[test]
fn idle_skill_is_archived_then_restore_is_suggested() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = redis("7.2.4");
        let skill = fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(181));
        let report = fx.archival.sweep().unwrap();
        assert_eq!(report.archived, 1, "{backend:?}");
        assert_eq!(
            fx.store.get_by_id(&skill.id).unwrap().unwrap().status,
            SkillStatus::Archived
        );

        let Decision::RestoreThenReuse(suggested) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected restore-then-reuse");
        };
        assert_eq!(suggested.id, skill.id);
        // Deciding never restores on its own.
        assert_eq!(
            fx.store.get_by_id(&skill.id).unwrap().unwrap().status,
            SkillStatus::Archived
        );
    }
}

#[test]
fn check_timeout_still_reuses_but_marks_stale() {
    for backend in Backend::ALL {
        let fx = EngineFixture::with_checker(
            backend,
            ScriptedChecker::clean().with_delay(Duration::from_secs(2)),
        );
        let context = redis("7.2.4");
        let skill = fx.engine.record(&context, None, 0).unwrap();
        let verified_before = fx.store.get_by_id(&skill.id).unwrap().unwrap().last_verified_at;

        fx.clock.advance(Days::days(31));
        let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected reuse");
        };
        assert_eq!(reused.status, SkillStatus::Stale);
        assert_eq!(reused.last_verified_at, verified_before);
        assert_eq!(reused.generation_count, 2);
        assert_eq!(fx.metrics.snapshot().check_failure_count, 1);
    }
}

#[test]
fn clean_check_advances_verification() {
    for backend in Backend::ALL {
        let fx = EngineFixture::new(backend);
        let context = redis("7.2.4");
        fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(30));
        let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected reuse");
        };
        assert_eq!(reused.status, SkillStatus::Active);
        assert_eq!(reused.last_verified_at, Some(fx.clock.now()));

        // The next request inside the fresh window does not ask again.
        fx.clock.advance(Days::days(1));
        fx.engine.decide(&context).unwrap();
        assert_eq!(fx.checker.calls().load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

#[test]
fn affirmative_breaking_change_regenerates() {
    for backend in Backend::ALL {
        let fx = EngineFixture::with_checker(backend, ScriptedChecker::breaking("redis 8 removed SYNC"));
        let context = redis("7.2.4");
        let skill = fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(45));
        let Decision::Regenerate { prior: Some(prior) } = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected regenerate");
        };
        assert_eq!(prior.id, skill.id);

        // Same fingerprint, new generation: lookups now resolve to the newer record.
        fx.clock.advance(Days::seconds(1));
        let next = fx.engine.record(&context, Some(&prior.id), 0).unwrap();
        let found = fx
            .store
            .get_by_hash(context.domain(), &context.fingerprint())
            .unwrap()
            .unwrap();
        assert_eq!(found.id, next.id);
    }
}

#[test]
fn stale_skill_is_reactivated_by_clean_reuse() {
    for backend in Backend::ALL {
        let fx = EngineFixture::with_checker(backend, ScriptedChecker::failing("registry down"));
        let context = redis("7.2.4");
        let skill = fx.engine.record(&context, None, 0).unwrap();

        fx.clock.advance(Days::days(31));
        fx.engine.decide(&context).unwrap();
        assert_eq!(
            fx.store.get_by_id(&skill.id).unwrap().unwrap().status,
            SkillStatus::Stale
        );

        fx.checker
            .set_outcome(dsr::test_utils::checkers::ScriptedOutcome::Clean);
        let Decision::Reuse(reused) = fx.engine.decide(&context).unwrap() else {
            panic!("{backend:?}: expected reuse");
        };
        assert_eq!(reused.status, SkillStatus::Active);
        assert_eq!(reused.generation_count, 3);
    }
}
