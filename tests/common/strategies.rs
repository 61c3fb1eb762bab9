use proptest::prelude::*;
use project_migrator::hierarchy::HierarchyNode;

/// Well-formed outline: starts at depth 0 and never indents by more than one step
pub fn valid_outline_strategy() -> impl Strategy<Value = Vec<HierarchyNode>> {
    prop::collection::vec(0u32..4, 0..60).prop_map(|steps| {
        let mut depth = 0u32;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                // 0 indents, 1 keeps the level, anything higher outdents
                depth = match step {
                    0 if i > 0 => depth + 1,
                    0 | 1 => depth,
                    n => depth.saturating_sub(n - 1),
                };
                HierarchyNode::new(format!("T{i}"), depth, i as u64)
            })
            .collect()
    })
}

/// Arbitrary depths, including jumps and leading children
pub fn arbitrary_outline_strategy() -> impl Strategy<Value = Vec<HierarchyNode>> {
    prop::collection::vec(0u32..8, 0..60).prop_map(|depths| {
        depths
            .into_iter()
            .enumerate()
            .map(|(i, depth)| HierarchyNode::new(format!("T{i}"), depth, i as u64))
            .collect()
    })
}

/// Outline whose ordinals are shuffled against source position
pub fn shuffled_ordinal_strategy() -> impl Strategy<Value = Vec<HierarchyNode>> {
    prop::collection::vec((0u32..5, 0u64..20), 0..40).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (depth, ordinal))| HierarchyNode::new(format!("T{i}"), depth, ordinal))
            .collect()
    })
}

/// HTTP status codes the destination may answer with
pub fn status_code_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        Just(400u16),
        Just(401),
        Just(403),
        Just(404),
        Just(408),
        Just(409),
        Just(429),
        500u16..600,
    ]
}
