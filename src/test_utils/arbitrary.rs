use proptest::prelude::*;

use crate::context::SkillContext;

pub fn arb_tool() -> impl Strategy<Value = (String, String)> {
    ("[a-z][a-z0-9_-]{1,12}", "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,3}")
}

pub fn arb_context() -> impl Strategy<Value = SkillContext> {
    (
        "[A-Za-z][A-Za-z ]{0,15}",
        prop::collection::btree_map("[a-z][a-z0-9_-]{1,12}", "[0-9]{1,2}\\.[0-9]{1,3}", 0..6),
        prop::collection::btree_set("[a-z][a-z ]{1,20}", 0..4),
    )
        .prop_map(|(domain, tools, gaps)| {
            let mut context = SkillContext::new(&domain);
            for (name, version) in &tools {
                context = context.with_tool(name, version);
            }
            for gap in &gaps {
                context = context.with_gap(gap);
            }
            context
        })
}
