//! Fixed resource-type hierarchy used to walk from one drill-down level to
//! the next.

use crate::Qualifier::{self, *};

/// Interchangeable qualifiers valid at one depth of a tree.
pub type QualifierGroup = &'static [Qualifier];

const DEFAULT_TREE: &[QualifierGroup] = &[
    &[Project],
    &[Module],
    &[Directory, Package],
    &[File, Class, UnitTestFile],
];

const VIEWS_TREE: &[QualifierGroup] = &[&[View], &[SubView], &[Project]];

const PERSONS_TREE: &[QualifierGroup] = &[&[Person], &[PersonProject]];

/// Trees in lookup priority order. The first tree with a matching group wins.
pub const HIERARCHY_TREES: &[&[QualifierGroup]] = &[DEFAULT_TREE, VIEWS_TREE, PERSONS_TREE];

/// Qualifiers one level below `qualifier`, or an empty group when the
/// qualifier is terminal or belongs to no tree.
pub fn child_qualifiers(qualifier: Qualifier) -> QualifierGroup {
    next_group(|group| group.contains(&qualifier))
}

/// Qualifiers one level below a group previously returned by this module.
/// Groups are compared as sets.
pub fn child_qualifiers_of_group(group: &[Qualifier]) -> QualifierGroup {
    if group.is_empty() {
        return &[];
    }
    next_group(|candidate| same_members(candidate, group))
}

fn next_group(matches: impl Fn(&[Qualifier]) -> bool) -> QualifierGroup {
    for tree in HIERARCHY_TREES {
        if let Some(index) = tree.iter().position(|group| matches(group)) {
            return tree.get(index + 1).copied().unwrap_or(&[]);
        }
    }
    &[]
}

fn same_members(left: &[Qualifier], right: &[Qualifier]) -> bool {
    left.len() == right.len() && right.iter().all(|qualifier| left.contains(qualifier))
}
