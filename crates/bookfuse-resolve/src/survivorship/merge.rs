use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use bookfuse_core::{
    BookAttributes, CanonicalField, CanonicalRecord, FieldKind, FieldOrigin, NormalizedRecord,
};
use tracing::debug;

use super::policy::{DefaultPolicy, FillRule, SurvivorshipPolicy};
use crate::dedup::DedupGroup;
use crate::error::{ResolveError, Result};

#[derive(Debug, Clone, Default)]
pub struct Merger<P = DefaultPolicy> {
    policy: P,
}

impl<P: SurvivorshipPolicy> Merger<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// One canonical record per group, in group order. Every input record must
    /// belong to exactly one group.
    pub fn merge(
        &self,
        groups: &[DedupGroup],
        records: &[NormalizedRecord],
    ) -> Result<Vec<CanonicalRecord>> {
        check_assignment(groups, records.len())?;

        let canonical: Vec<CanonicalRecord> = groups
            .iter()
            .map(|group| self.merge_group(group, records))
            .collect();

        debug!(
            groups = groups.len(),
            records = records.len(),
            "merged dedup groups"
        );
        Ok(canonical)
    }

    /// Members in survivorship order: fewest absent attributes, then source
    /// rank, then most recently ingested, then input order.
    pub fn rank_members(&self, group: &DedupGroup, records: &[NormalizedRecord]) -> Vec<usize> {
        let mut ranked = group.members.clone();
        ranked.sort_by_key(|&idx| {
            let record = &records[idx];
            (
                record.attrs.absent_count(),
                self.policy.source_rank(record.source),
                Reverse(record.ingested_at),
                idx,
            )
        });
        ranked
    }

    fn merge_group(&self, group: &DedupGroup, records: &[NormalizedRecord]) -> CanonicalRecord {
        let ranked: Vec<&NormalizedRecord> = self
            .rank_members(group, records)
            .into_iter()
            .map(|idx| &records[idx])
            .collect();
        let winner = ranked[0];
        let mut attrs = winner.attrs.clone();
        let mut field_sources: BTreeMap<CanonicalField, Vec<FieldOrigin>> = BTreeMap::new();

        for field in CanonicalField::ALL {
            let origins: Vec<FieldOrigin> = match field.kind() {
                FieldKind::Text => {
                    let donor = if attrs.is_absent(field) {
                        let donor = fill_text(field, self.policy.fill_rule(field), &ranked);
                        let value = donor.and_then(|d| d.attrs.text(field)).map(str::to_string);
                        attrs.set_text(field, value);
                        donor
                    } else {
                        Some(winner)
                    };
                    donor.map(FieldOrigin::from).into_iter().collect()
                }
                FieldKind::Number => {
                    let donor = if attrs.is_absent(field) {
                        fill_number(field, &mut attrs, &ranked)
                    } else {
                        Some(winner)
                    };
                    donor.map(FieldOrigin::from).into_iter().collect()
                }
                FieldKind::List => {
                    let mut merged = Vec::new();
                    let mut contributors = Vec::new();
                    for record in &ranked {
                        if append_unique(&mut merged, record.attrs.list(field)) {
                            contributors.push(FieldOrigin::from(*record));
                        }
                    }
                    attrs.set_list(field, merged);
                    contributors
                }
            };
            if !origins.is_empty() {
                field_sources.insert(field, origins);
            }
        }

        CanonicalRecord {
            dup_key: group.dup_key.clone(),
            attrs,
            winning_source: winner.source,
            member_count: ranked.len(),
            field_sources,
        }
    }
}

impl Merger<DefaultPolicy> {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_assignment(groups: &[DedupGroup], record_count: usize) -> Result<()> {
    let mut seen = vec![false; record_count];
    for group in groups {
        if group.members.is_empty() {
            return Err(ResolveError::MergeInvariant(format!(
                "group {} has no members",
                group.dup_key
            )));
        }
        for &idx in &group.members {
            match seen.get_mut(idx) {
                None => {
                    return Err(ResolveError::MergeInvariant(format!(
                        "group {} references record {idx} of {record_count}",
                        group.dup_key
                    )));
                }
                Some(true) => {
                    return Err(ResolveError::MergeInvariant(format!(
                        "record {idx} assigned to more than one group"
                    )));
                }
                Some(slot) => *slot = true,
            }
        }
    }

    if let Some(idx) = seen.iter().position(|assigned| !assigned) {
        return Err(ResolveError::MergeInvariant(format!(
            "record {idx} is not assigned to any group"
        )));
    }
    Ok(())
}

/// The member whose value fills `field` under `rule`.
fn fill_text<'a>(
    field: CanonicalField,
    rule: FillRule,
    ranked: &[&'a NormalizedRecord],
) -> Option<&'a NormalizedRecord> {
    let mut donors = ranked
        .iter()
        .copied()
        .filter_map(|record| record.attrs.text(field).map(|value| (record, value)));
    match rule {
        FillRule::FirstRanked => donors.next().map(|(record, _)| record),
        FillRule::Longest => donors
            .fold(None::<(&NormalizedRecord, &str)>, |best, (record, value)| match best {
                Some((_, b)) if b.chars().count() >= value.chars().count() => best,
                _ => Some((record, value)),
            })
            .map(|(record, _)| record),
    }
}

/// Copies the first ranked value of a numeric field and returns its donor.
fn fill_number<'a>(
    field: CanonicalField,
    attrs: &mut BookAttributes,
    ranked: &[&'a NormalizedRecord],
) -> Option<&'a NormalizedRecord> {
    ranked
        .iter()
        .copied()
        .find(|record| attrs.copy_number_from(field, &record.attrs))
}

/// Appends values not already present, compared case-insensitively. Returns
/// whether anything was added.
fn append_unique(target: &mut Vec<String>, values: &[String]) -> bool {
    let mut seen: HashSet<String> = target.iter().map(|v| v.to_lowercase()).collect();
    let before = target.len();
    for value in values {
        if seen.insert(value.to_lowercase()) {
            target.push(value.clone());
        }
    }
    target.len() > before
}
