use std::collections::{BTreeMap, BTreeSet};

use dsr::context::{ContextHash, SkillContext, fingerprint};
use proptest::prelude::*;

fn tools() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z][a-z0-9-]{0,10}", "[0-9]{1,2}\\.[0-9]{1,2}", 1..6)
}

fn gaps() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z][a-z ]{0,15}", 0..4)
}

fn build(domain: &str, tools: &BTreeMap<String, String>, gaps: &BTreeSet<String>) -> SkillContext {
    let mut context = SkillContext::new(domain);
    for (name, version) in tools {
        context = context.with_tool(name, version);
    }
    for gap in gaps {
        context = context.with_gap(gap);
    }
    context
}

proptest! {
    #[test]
    fn same_inputs_same_hash(domain in "[a-z]{1,12}", tools in tools(), gaps in gaps()) {
        let first = build(&domain, &tools, &gaps).fingerprint();
        let second = build(&domain, &tools, &gaps).fingerprint();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn insertion_order_does_not_matter(domain in "[a-z]{1,12}", tools in tools(), gaps in gaps()) {
        let forward = build(&domain, &tools, &gaps);

        let mut reversed = SkillContext::new(&domain);
        for (name, version) in tools.iter().rev() {
            reversed = reversed.with_tool(name, version);
        }
        for gap in gaps.iter().rev() {
            reversed = reversed.with_gap(gap);
        }
        prop_assert_eq!(forward.fingerprint(), reversed.fingerprint());
    }

    #[test]
    fn domain_case_is_ignored(domain in "[a-z]{1,12}", tools in tools()) {
        let lower = build(&domain, &tools, &BTreeSet::new()).fingerprint();
        let upper = build(&domain.to_uppercase(), &tools, &BTreeSet::new()).fingerprint();
        prop_assert_eq!(lower, upper);
    }

    #[test]
    fn changing_one_version_changes_hash(
        domain in "[a-z]{1,12}",
        tools in tools(),
        gaps in gaps(),
        pick in any::<prop::sample::Index>(),
    ) {
        let original = build(&domain, &tools, &gaps).fingerprint();
        let mut bumped = tools.clone();
        let key = pick.get(&tools.keys().cloned().collect::<Vec<_>>()).clone();
        bumped.entry(key).and_modify(|version| version.push_str(".1"));
        prop_assert_ne!(original, build(&domain, &bumped, &gaps).fingerprint());
    }

    #[test]
    fn adding_a_gap_changes_hash(
        domain in "[a-z]{1,12}",
        tools in tools(),
        gaps in gaps(),
        extra in "[A-Z]{3,8}",
    ) {
        let original = build(&domain, &tools, &gaps).fingerprint();
        let mut widened = gaps.clone();
        widened.insert(extra);
        prop_assert_ne!(original, build(&domain, &tools, &widened).fingerprint());
    }

    #[test]
    fn hex_form_round_trips(domain in "[a-z]{1,12}", tools in tools()) {
        let hash = fingerprint(
            &domain,
            tools.iter().map(|(name, version)| (name.as_str(), version.as_str())),
            std::iter::empty(),
        );
        let parsed: ContextHash = hash.to_hex().parse().unwrap();
        prop_assert_eq!(hash, parsed);
    }
}
