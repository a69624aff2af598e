use rustc_hash::FxHashSet;
use tacopt::utils::{
    cfg::EdgeMap,
    dominance::{dominance_frontiers, dominator_sets, immediate_dominators},
};

fn set(labels: &[&str]) -> FxHashSet<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

fn edge_map(edges: &[(&str, &[&str])]) -> EdgeMap {
    edges
        .iter()
        .map(|(from, to)| (from.to_string(), to.iter().map(|t| t.to_string()).collect()))
        .collect()
}

//       5
//      / \
//     /   \
//    /     \
//   4       3
//   |       |
//   1 <---- 2
//   +------->
//
// Ref: Figure 2 in "A Simple, Fast Dominance Algorithm" by Cooper et al.
fn cooper_figure_2() -> EdgeMap {
    edge_map(&[
        ("b5", &["b4", "b3"]),
        ("b4", &["b1"]),
        ("b3", &["b2"]),
        ("b1", &["b2"]),
        ("b2", &["b1"]),
    ])
}

#[test]
fn test_dominator_sets() {
    let succs = cooper_figure_2();
    let doms = dominator_sets(&succs, "b5");

    assert_eq!(doms["b5"], set(&["b5"]));
    assert_eq!(doms["b4"], set(&["b5", "b4"]));
    assert_eq!(doms["b3"], set(&["b5", "b3"]));
    assert_eq!(doms["b2"], set(&["b5", "b2"]));
    assert_eq!(doms["b1"], set(&["b5", "b1"]));
}

#[test]
fn test_dominator_sets_linear_chain() {
    let succs = edge_map(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
    let doms = dominator_sets(&succs, "a");

    assert_eq!(doms["a"], set(&["a"]));
    assert_eq!(doms["b"], set(&["a", "b"]));
    assert_eq!(doms["c"], set(&["a", "b", "c"]));
}

#[test]
fn test_immediate_dominators() {
    let succs = cooper_figure_2();
    let doms = dominator_sets(&succs, "b5");
    let idoms = immediate_dominators(&doms, &succs, "b5");

    assert_eq!(idoms["b5"], None);
    assert_eq!(idoms["b4"].as_deref(), Some("b5"));
    assert_eq!(idoms["b3"].as_deref(), Some("b5"));
    assert_eq!(idoms["b2"].as_deref(), Some("b5"));
    assert_eq!(idoms["b1"].as_deref(), Some("b5"));
}

#[test]
fn test_dominance_frontiers() {
    let succs = cooper_figure_2();
    let doms = dominator_sets(&succs, "b5");
    let frontiers = dominance_frontiers(&doms, &succs, "b5");

    assert_eq!(frontiers["b5"], set(&[]));
    assert_eq!(frontiers["b4"], set(&["b1"]));
    assert_eq!(frontiers["b3"], set(&["b2"]));
    assert_eq!(frontiers["b2"], set(&["b1"]));
    assert_eq!(frontiers["b1"], set(&["b2"]));
}

#[test]
fn test_unreachable_blocks_keep_full_sets() {
    let succs = edge_map(&[("a", &["b"]), ("b", &[]), ("island", &["b"])]);
    let doms = dominator_sets(&succs, "a");

    // the unreachable block never constrains a reachable one
    assert_eq!(doms["b"], set(&["a", "b"]));
    assert!(doms["island"].contains("island"));
    assert!(doms["island"].contains("a"));
}
