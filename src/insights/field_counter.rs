use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::insights::types::FieldCounts;
use crate::model::{EntityKind, ObjectId};
use crate::storage::InsightStore;

/// Label used in breakdowns for groups whose value is NULL.
pub const NULL_LABEL: &str = "(none)";

/// Check `fields` against the registry for `kind`.
///
/// Rejects an empty list, names that are not declared scalar fields of the
/// kind, and names listed more than once.
pub fn validate_fields(kind: EntityKind, fields: &[&str]) -> Result<Vec<&'static str>> {
    if fields.is_empty() {
        return Err(Error::InvalidValue(format!(
            "at least one {kind} field is required"
        )));
    }
    let mut columns: Vec<&'static str> = Vec::with_capacity(fields.len());
    for name in fields {
        let column = kind.resolve_field(name)?;
        if columns.contains(&column) {
            return Err(Error::InvalidField {
                kind: kind.to_string(),
                field: format!("{name} (listed more than once)"),
            });
        }
        columns.push(column);
    }
    Ok(columns)
}

/// Count the owner's records of `kind` grouped by `fields`.
///
/// Groups are keyed by their index in the store's ordering. Each group
/// carries its count and the grouped values, e.g. for `["status"]`:
/// `{0: {_count: 2, status: "active"}, 1: {_count: 1, status: "completed"}}`.
pub async fn count_fields(
    store: &dyn InsightStore,
    owner_id: &ObjectId,
    kind: EntityKind,
    fields: &[&str],
) -> Result<FieldCounts> {
    let columns = validate_fields(kind, fields)?;
    log::debug!("Counting {kind} for {owner_id} grouped by {}", columns.join(", "));
    let groups = store.group_count(owner_id, kind, &columns).await?;
    Ok(groups.into_iter().enumerate().collect())
}

/// Sum of counts across all groups.
pub fn total(counts: &FieldCounts) -> u64 {
    counts.values().map(|g| g.count).sum()
}

/// Collapse grouped counts into `value -> count` for one field.
pub fn breakdown(counts: &FieldCounts, field: &str) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for group in counts.values() {
        let label = group.value(field).unwrap_or(NULL_LABEL).to_string();
        *out.entry(label).or_insert(0) += group.count;
    }
    out
}
