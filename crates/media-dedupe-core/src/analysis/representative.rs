use super::grouping::{GroupingPlan, ProvisionalGroup};
use crate::model::{DuplicateGroup, GroupId, MediaRecord, QualityHint};
use crate::policy::{PriorityClass, SelectionPolicy};
use std::cmp::Reverse;

/// Pick the member that ranks first under `policy`.
///
/// Ranking is priority class, then quality hint (a present hint beats an absent
/// one), then the smallest id. `members` must be non-empty positions into `records`.
pub fn select_representative(
    records: &[MediaRecord],
    members: &[usize],
    policy: &dyn SelectionPolicy,
) -> usize {
    let mut best = members[0];
    let mut best_key = rank_key(&records[best], policy);
    for &pos in &members[1..] {
        let key = rank_key(&records[pos], policy);
        if key < best_key {
            best = pos;
            best_key = key;
        }
    }
    best
}

type RankKey<'r> = (PriorityClass, Reverse<Option<QualityHint>>, &'r str);

fn rank_key<'r>(record: &'r MediaRecord, policy: &dyn SelectionPolicy) -> RankKey<'r> {
    (
        policy.priority_class(record),
        Reverse(policy.quality(record)),
        record.id.as_str(),
    )
}

/// Turn one partition's provisional groups into numbered [`DuplicateGroup`]s.
///
/// `groups` must already be ordered by smallest member; sequence numbers follow
/// that order.
pub fn finalize_groups(
    records: &[MediaRecord],
    partition: u32,
    groups: Vec<ProvisionalGroup>,
    plan: GroupingPlan,
    exact_content: bool,
    policy: &dyn SelectionPolicy,
) -> Vec<DuplicateGroup> {
    groups
        .into_iter()
        .enumerate()
        .map(|(sequence, group)| {
            let representative = select_representative(records, &group.members, policy);
            DuplicateGroup {
                group_id: GroupId::new(partition, sequence as u32),
                member_ids: group
                    .members
                    .iter()
                    .map(|&pos| records[pos].id.clone())
                    .collect(),
                representative_id: records[representative].id.clone(),
                method: plan.method_tag(exact_content, group.linked_by),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseSpec;
    use crate::hasher::HashKind;
    use crate::model::LinkBasis;
    use crate::policy::default_policy;

    #[test]
    fn test_priority_class_beats_quality() {
        let records = vec![
            MediaRecord::new("a", "holiday (1).jpg").with_quality(QualityHint::new(9_000, 0)),
            MediaRecord::new("b", "20231009_154612_C1x2Yz3AbC.jpg")
                .with_quality(QualityHint::new(10, 0)),
        ];
        assert_eq!(select_representative(&records, &[0, 1], &default_policy()), 1);
    }

    #[test]
    fn test_quality_breaks_class_ties() {
        let records = vec![
            MediaRecord::new("a", "x.jpg").with_quality(QualityHint::new(100, 5)),
            MediaRecord::new("b", "y.jpg").with_quality(QualityHint::new(100, 9)),
            MediaRecord::new("c", "z.jpg"),
        ];
        assert_eq!(select_representative(&records, &[0, 1, 2], &default_policy()), 1);
    }

    #[test]
    fn test_id_is_final_tie_break() {
        let records = vec![
            MediaRecord::new("b", "x.jpg"),
            MediaRecord::new("a", "y.jpg"),
        ];
        let policy = default_policy();
        assert_eq!(select_representative(&records, &[0, 1], &policy), 1);
        assert_eq!(select_representative(&records, &[1, 0], &policy), 1);
    }

    #[test]
    fn test_custom_classifier() {
        let policy = crate::policy::FilenamePolicy::new(|name: &str| {
            if name.ends_with(".png") {
                PriorityClass::Canonical
            } else {
                PriorityClass::Generic
            }
        });
        let records = vec![MediaRecord::new("a", "a.jpg"), MediaRecord::new("b", "b.png")];
        assert_eq!(select_representative(&records, &[0, 1], &policy), 1);
    }

    #[test]
    fn test_finalize_numbers_groups_in_order() {
        let records = vec![
            MediaRecord::new("a", "a.jpg"),
            MediaRecord::new("b", "b.jpg"),
            MediaRecord::new("c", "c.jpg"),
        ];
        let groups = vec![
            ProvisionalGroup {
                members: vec![0, 2],
                linked_by: LinkBasis::Perceptual,
            },
            ProvisionalGroup {
                members: vec![1],
                linked_by: LinkBasis::Unlinked,
            },
        ];
        let plan = GroupingPlan::Single(PhaseSpec::new(HashKind::PHash, 3));
        let finalized = finalize_groups(&records, 4, groups, plan, true, &default_policy());
        assert_eq!(finalized[0].group_id, GroupId::new(4, 0));
        assert_eq!(finalized[0].member_ids, vec!["a", "c"]);
        assert_eq!(finalized[0].representative_id, "a");
        assert_eq!(finalized[1].group_id, GroupId::new(4, 1));
        assert_eq!(finalized[1].representative_id, "b");
        assert_eq!(finalized[0].method.label(), "phash:3+exact");
    }
}
