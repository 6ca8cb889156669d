//! Cluster merge: collapse every primary of a working set into the oldest one.
use tracing::info;

use crate::contact_db::Link;
use crate::reconcile::resolve::WorkingSet;
use crate::reconcile::{Cluster, ContactStore};

/// Writes performed by one merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Former primaries now secondary to the survivor
    pub demoted: Vec<i64>,
    /// Secondaries re-pointed at the survivor
    pub relinked: Vec<i64>,
}

impl MergeSummary {
    pub fn is_empty(&self) -> bool {
        self.demoted.is_empty() && self.relinked.is_empty()
    }

    pub fn writes(&self) -> usize {
        self.demoted.len() + self.relinked.len()
    }
}

/// Turn a working set into a single cluster.
///
/// The survivor is the primary with the smallest `(created_at, id)`. Every other primary is
/// demoted and every secondary not already linked to the survivor is re-pointed at it, one
/// `update` per row. When anything was written the cluster is fetched again from the store.
pub fn merge<S: ContactStore + ?Sized>(store: &S, working: WorkingSet) -> anyhow::Result<(Cluster, MergeSummary)> {
    let mut primaries: Vec<_> = working
        .contacts()
        .iter()
        .filter(|c| c.is_primary())
        .map(|c| (c.created_at, c.id))
        .collect();
    primaries.sort();

    let (_, survivor_id) = *primaries
        .first()
        .ok_or_else(|| anyhow::anyhow!("working set has no primary contact"))?;
    let survivor = Link::Secondary { primary_id: survivor_id };

    let mut summary = MergeSummary::default();
    for &(_, id) in primaries.iter().skip(1) {
        store.update(id, survivor)?;
        summary.demoted.push(id);
    }

    let strays: Vec<i64> = working
        .contacts()
        .iter()
        .filter(|c| !c.is_primary() && c.primary_id() != survivor_id)
        .map(|c| c.id)
        .collect();
    for id in strays {
        store.update(id, survivor)?;
        summary.relinked.push(id);
    }

    if summary.is_empty() {
        return Ok((Cluster::from_contacts(working.into_contacts())?, summary));
    }

    info!(
        primary_id = survivor_id,
        demoted = ?summary.demoted,
        relinked = ?summary.relinked,
        "merged identity clusters"
    );
    let refreshed = store.find_cluster(survivor_id)?;
    Ok((Cluster::from_contacts(refreshed)?, summary))
}
