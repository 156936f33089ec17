//! Group assembly for committed contexts.
//!
//! A group context owns an ordered list of member contexts and never
//! carries text of its own: its `location`, `number`, and `preceding`
//! come from the first member, its `keyword` is the space-joined
//! concatenation of member keywords, and its `following` comes from
//! the last member. Removing the last member dissolves the group.
//!
//! Membership is held as an explicit id list on the group record, so
//! the self-referential structure stays acyclic by construction.

use crate::models::{Context, GroupRole};

/// Outcome of recomputing a group from its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupUpdate {
    /// Derived fields were recomputed; the group persists.
    Updated,
    /// The member list is empty; the group must be deleted.
    Dissolved,
}

/// Recomputes a group's derived fields from its ordered members.
///
/// Also rewrites `member_ids` to match the given member order and tags
/// the group's role. Returns [`GroupUpdate::Dissolved`] without
/// touching the group when `members` is empty.
pub fn recompute_group(group: &mut Context, members: &[Context]) -> GroupUpdate {
    let Some(first) = members.first() else {
        return GroupUpdate::Dissolved;
    };
    let last = members.last().unwrap_or(first);

    group.group_role = GroupRole::Group;
    group.member_ids = members.iter().map(|m| m.id.clone()).collect();
    group.location = first.location.clone();
    group.number = first.number;
    group.preceding = first.preceding.clone();
    group.keyword = members
        .iter()
        .map(|m| m.keyword.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    group.following = last.following.clone();

    GroupUpdate::Updated
}

/// Builds a fresh group context over the given ordered members.
///
/// Returns `None` for an empty member list; a group cannot exist
/// without members.
pub fn assemble_group(members: &[Context]) -> Option<Context> {
    if members.is_empty() {
        return None;
    }

    let mut group = Context::new("", -1, "", "", "", crate::models::ContextKind::None);
    recompute_group(&mut group, members);
    Some(group)
}
