//! Deduplication (C8)

use crate::similarity::cosine;
use crate::volume::Volume;

/// Outcome of [`check_duplicate`].
#[derive(Debug, Clone)]
pub enum DuplicateCheck {
    Duplicate { id: String, similarity: f32 },
    NotDuplicate,
}

/// Linear scan for the single best duplicate above `threshold` among
/// volumes whose embedding dimension matches `embedding`'s.
pub fn check_duplicate(volumes: &[&Volume], embedding: &[f32], threshold: f32) -> DuplicateCheck {
    let mut best: Option<(&str, f32)> = None;
    for v in volumes {
        if v.embedding.len() != embedding.len() {
            continue;
        }
        if let Some(sim) = cosine(&v.embedding, embedding) {
            if sim >= threshold && best.is_none_or(|(_, b)| sim > b) {
                best = Some((v.id.as_str(), sim));
            }
        }
    }
    match best {
        Some((id, similarity)) => DuplicateCheck::Duplicate {
            id: id.to_string(),
            similarity,
        },
        None => DuplicateCheck::NotDuplicate,
    }
}

/// A cluster of near-duplicate volumes sharing a representative.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub representative_id: String,
    pub member_ids: Vec<String>,
    pub average_similarity: f32,
}

/// Greedy single-pass clustering over `volumes` sorted by timestamp
/// ascending: each volume joins the first existing group whose
/// representative scores >= `threshold`, or starts a new group. Only
/// groups with at least one duplicate (more than the representative) are
/// returned.
pub fn find_duplicates(volumes: &[&Volume], threshold: f32) -> Vec<DuplicateGroup> {
    let mut ordered: Vec<&Volume> = volumes.iter().copied().collect();
    ordered.sort_by_key(|v| v.timestamp);

    struct Group<'a> {
        representative: &'a Volume,
        members: Vec<&'a Volume>,
        similarities: Vec<f32>,
    }

    let mut groups: Vec<Group> = Vec::new();

    for &v in &ordered {
        let mut joined = false;
        for group in &mut groups {
            if group.representative.embedding.len() != v.embedding.len() {
                continue;
            }
            if let Some(sim) = cosine(&group.representative.embedding, &v.embedding) {
                if sim >= threshold {
                    group.members.push(v);
                    group.similarities.push(sim);
                    joined = true;
                    break;
                }
            }
        }
        if !joined {
            groups.push(Group {
                representative: v,
                members: Vec::new(),
                similarities: Vec::new(),
            });
        }
    }

    groups
        .into_iter()
        .filter(|g| !g.members.is_empty())
        .map(|g| {
            let average_similarity = g.similarities.iter().sum::<f32>() / g.similarities.len() as f32;
            let mut member_ids = vec![g.representative.id.clone()];
            member_ids.extend(g.members.iter().map(|m| m.id.clone()));
            DuplicateGroup {
                representative_id: g.representative.id.clone(),
                member_ids,
                average_similarity,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn volume(id: &str, embedding: Vec<f32>, ts_ms: i64) -> Volume {
        use chrono::{TimeZone, Utc};
        Volume {
            id: id.to_string(),
            text: "x".to_string(),
            embedding,
            metadata: HashMap::new(),
            timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
        }
    }

    #[test]
    fn check_duplicate_finds_best_above_threshold() {
        let a = volume("a", vec![1.0, 0.0], 0);
        let b = volume("b", vec![0.99, 0.01], 1);
        let volumes = vec![&a, &b];
        match check_duplicate(&volumes, &[1.0, 0.0], 0.95) {
            DuplicateCheck::Duplicate { id, .. } => assert_eq!(id, "a"),
            DuplicateCheck::NotDuplicate => panic!("expected a duplicate"),
        }
    }

    #[test]
    fn check_duplicate_skips_mismatched_dims() {
        let a = volume("a", vec![1.0, 0.0, 0.0], 0);
        let volumes = vec![&a];
        assert!(matches!(
            check_duplicate(&volumes, &[1.0, 0.0], 0.5),
            DuplicateCheck::NotDuplicate
        ));
    }

    #[test]
    fn find_duplicates_groups_by_representative() {
        let a = volume("a", vec![1.0, 0.0], 0);
        let b = volume("b", vec![0.99, 0.01], 1);
        let c = volume("c", vec![0.0, 1.0], 2);
        let volumes = vec![&a, &b, &c];

        let groups = find_duplicates(&volumes, 0.95);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative_id, "a");
        assert_eq!(groups[0].member_ids, vec!["a".to_string(), "b".to_string()]);
        assert!(groups[0].average_similarity >= 0.95);
    }

    #[test]
    fn singleton_groups_are_excluded() {
        let a = volume("a", vec![1.0, 0.0], 0);
        let volumes = vec![&a];
        assert!(find_duplicates(&volumes, 0.95).is_empty());
    }
}
