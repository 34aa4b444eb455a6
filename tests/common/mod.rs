#![allow(dead_code)]

use avlkit::{AvlTree, NaturalOrder, Node, TreeConfig, VisitAction, VisitFlags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Recomputes every subtree height from scratch and checks the stored
/// balance factors against them. Returns the height of `node`.
pub fn check_balance<T>(node: Option<&Node<T>>) -> usize {
    let Some(node) = node else {
        return 0;
    };

    let left = check_balance(node.left());
    let right = check_balance(node.right());
    let actual = right as i64 - left as i64;

    assert!((-1..=1).contains(&actual), "subtree unbalanced by {}", actual);
    assert_eq!(node.balance() as i64, actual, "stale balance factor");
    left.max(right) + 1
}

/// Values in the order `flags` selects, collected through a visit.
pub fn visit_values<T: Copy + Ord>(tree: &AvlTree<T>, flags: VisitFlags) -> Vec<T> {
    let mut out = Vec::with_capacity(tree.len());
    tree.visit(flags, |node, _| {
        out.push(*node.value());
        VisitAction::Continue
    })
    .expect("visit failed");
    out
}

pub fn seeded_values(count: usize, upper: u64, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(0..upper)).collect()
}

pub fn build_tree(values: &[u64], threshold: usize) -> AvlTree<u64> {
    let config = TreeConfig::new().with_parallel_threshold(threshold);
    let mut tree = AvlTree::with_config(NaturalOrder, config).expect("valid config");
    for &value in values {
        tree.insert(value).expect("insert");
    }
    tree
}

pub fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values
}
