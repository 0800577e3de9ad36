use crate::error::Result;
use crate::insights::field_counter::{self, count_fields};
use crate::insights::types::GeneralInfo;
use crate::model::{EntityKind, ObjectId};
use crate::storage::InsightStore;

/// Total plus status and priority breakdowns of the owner's records.
///
/// Both breakdowns are counted concurrently and must succeed; the total is
/// the sum over the status groups.
pub async fn general_info(
    store: &dyn InsightStore,
    owner_id: &ObjectId,
    kind: EntityKind,
) -> Result<GeneralInfo> {
    let (status, priority) = tokio::try_join!(
        count_fields(store, owner_id, kind, &["status"]),
        count_fields(store, owner_id, kind, &["priority"]),
    )?;

    let total = field_counter::total(&status);
    let priority_total = field_counter::total(&priority);
    if total != priority_total {
        log::warn!(
            "{kind} totals for {owner_id} disagree: {total} by status, {priority_total} by priority"
        );
    }

    Ok(GeneralInfo {
        total,
        status,
        priority,
    })
}
