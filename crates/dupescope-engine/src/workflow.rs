//! Lifecycle of duplicate sets across detection passes.
//!
//! Transitions on one set are serialized by that set's mutex; different sets
//! only share the index read lock. Passes run one at a time and take the
//! write lock to swap in their sets, so registration never interleaves with
//! an in-flight transition.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dupescope_core::{
    DupescopeError, DuplicateSet, MatchConfig, MergedRecord, PassId, Record, RecordId,
    RemoveOutcome, Result, SetId, SetStatus,
};
use tracing::{debug, info};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::cancel::CancelToken;
use crate::cluster::{Detection, DetectionOutcome, DuplicateClusterer};
use crate::merge::{index_records, merge_records};

struct Entry {
    set: Mutex<DuplicateSet>,
    /// Case sensitivity of the pass that produced the set, reused by merge.
    case_sensitive: bool,
}

/// Owns every duplicate set and applies operator decisions to them.
pub struct ResolutionWorkflow {
    clusterer: DuplicateClusterer,
    audit: Arc<dyn AuditSink>,
    sets: RwLock<BTreeMap<SetId, Entry>>,
    reincluded: Mutex<HashSet<RecordId>>,
    /// Held for a whole pass so passes register in id order.
    pass_lock: Mutex<()>,
    last_pass: AtomicU64,
}

impl ResolutionWorkflow {
    /// `audit` is called while the affected set is locked and must not call
    /// back into the workflow.
    pub fn new(clusterer: DuplicateClusterer, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            clusterer,
            audit,
            sets: RwLock::new(BTreeMap::new()),
            reincluded: Mutex::new(HashSet::new()),
            pass_lock: Mutex::new(()),
            last_pass: AtomicU64::new(0),
        }
    }

    /// Run a detection pass and register its sets.
    ///
    /// Members of merged or ignored sets are skipped unless re-included.
    /// Pending sets from earlier passes are superseded by the new ones;
    /// resolved sets are kept untouched. Transitions may run during the
    /// pass; if one resolves a record the pass picked up, the pass is
    /// scored again without it.
    pub fn run_pass(
        &self,
        records: &[Record],
        cfg: &MatchConfig,
        cancel: &CancelToken,
    ) -> Result<DetectionOutcome> {
        let _pass = lock(&self.pass_lock);
        let pass = PassId(self.last_pass.fetch_add(1, Ordering::SeqCst) + 1);

        loop {
            let excluded = self.excluded_ids();
            let detection = match self.clusterer.detect(records, cfg, &excluded, pass, cancel)? {
                DetectionOutcome::Completed(detection) => detection,
                DetectionOutcome::Cancelled => return Ok(DetectionOutcome::Cancelled),
            };

            match self.register(&detection, cfg.case_sensitive) {
                Ok(retired) => {
                    info!(
                        pass = %pass,
                        new_sets = detection.sets.len(),
                        retired,
                        "registered detection pass"
                    );
                    return Ok(DetectionOutcome::Completed(detection));
                }
                Err(resolved) => {
                    debug!(
                        pass = %pass,
                        resolved = resolved.len(),
                        "records resolved during pass, scoring again"
                    );
                }
            }
        }
    }

    /// Swap in the sets of a finished pass, returning how many pending sets
    /// were retired. Fails with the offending ids when a new set contains a
    /// record that has been resolved since the pass took its exclusions.
    fn register(
        &self,
        detection: &Detection,
        case_sensitive: bool,
    ) -> std::result::Result<usize, Vec<RecordId>> {
        let reincluded = lock(&self.reincluded);
        let mut sets = write(&self.sets);

        let excluded = resolved_members(&sets, &reincluded);
        let resolved: Vec<RecordId> = detection
            .sets
            .iter()
            .flat_map(|set| set.members())
            .filter(|id| excluded.contains(*id))
            .cloned()
            .collect();
        if !resolved.is_empty() {
            return Err(resolved);
        }

        let before = sets.len();
        sets.retain(|_, entry| !lock(&entry.set).is_pending());
        let retired = before - sets.len();

        for set in &detection.sets {
            sets.insert(
                set.id(),
                Entry {
                    set: Mutex::new(set.clone()),
                    case_sensitive,
                },
            );
        }
        Ok(retired)
    }

    /// Bring records of resolved sets back into future passes.
    pub fn reinclude(&self, ids: impl IntoIterator<Item = RecordId>) {
        lock(&self.reincluded).extend(ids);
    }

    /// Record ids that the next pass will skip.
    pub fn excluded_ids(&self) -> HashSet<RecordId> {
        let reincluded = lock(&self.reincluded);
        let sets = read(&self.sets);
        resolved_members(&sets, &reincluded)
    }

    pub fn get(&self, id: SetId) -> Result<DuplicateSet> {
        let sets = read(&self.sets);
        let entry = sets.get(&id).ok_or(DupescopeError::SetNotFound(id))?;
        Ok(lock(&entry.set).clone())
    }

    /// Every known set, ordered by id.
    pub fn sets(&self) -> Vec<DuplicateSet> {
        read(&self.sets)
            .values()
            .map(|entry| lock(&entry.set).clone())
            .collect()
    }

    /// Sets in one status, most similar first.
    pub fn sets_with_status(&self, status: SetStatus) -> Vec<DuplicateSet> {
        let mut sets: Vec<DuplicateSet> = self
            .sets()
            .into_iter()
            .filter(|set| set.status() == status)
            .collect();
        sets.sort_by(|a, b| {
            b.similarity()
                .total_cmp(&a.similarity())
                .then_with(|| a.id().cmp(&b.id()))
        });
        sets
    }

    /// Compute the merged record without resolving the set.
    pub fn preview_merge(&self, id: SetId, records: &[Record]) -> Result<MergedRecord> {
        let sets = read(&self.sets);
        let entry = sets.get(&id).ok_or(DupescopeError::SetNotFound(id))?;
        let set = lock(&entry.set);
        set.ensure_pending("merge")?;
        merge_records(id, set.members(), &index_records(records), entry.case_sensitive)
    }

    /// `Pending → Merged`, producing the canonical record.
    pub fn merge(&self, id: SetId, records: &[Record]) -> Result<MergedRecord> {
        let sets = read(&self.sets);
        let entry = sets.get(&id).ok_or(DupescopeError::SetNotFound(id))?;
        let mut set = lock(&entry.set);
        set.ensure_pending("merge")?;

        let merged = merge_records(id, set.members(), &index_records(records), entry.case_sensitive)?;
        let at = Utc::now();
        set.mark_merged(merged.clone(), at)?;

        debug!(set = %id, fields = merged.fields.len(), "merged duplicate set");
        self.audit.record(AuditEvent {
            set_id: id,
            action: AuditAction::Merge,
            record_ids: set.members().to_vec(),
            at,
        });
        Ok(merged)
    }

    /// `Pending → Ignored`: the records are not duplicates.
    pub fn ignore(&self, id: SetId) -> Result<()> {
        let sets = read(&self.sets);
        let entry = sets.get(&id).ok_or(DupescopeError::SetNotFound(id))?;
        let mut set = lock(&entry.set);

        let at = Utc::now();
        set.mark_ignored(at)?;

        debug!(set = %id, "ignored duplicate set");
        self.audit.record(AuditEvent {
            set_id: id,
            action: AuditAction::Ignore,
            record_ids: set.members().to_vec(),
            at,
        });
        Ok(())
    }

    /// Drop one record from a pending set; collapses the set when fewer
    /// than two members would remain.
    pub fn remove_member(&self, id: SetId, record: &RecordId) -> Result<RemoveOutcome> {
        let sets = read(&self.sets);
        let entry = sets.get(&id).ok_or(DupescopeError::SetNotFound(id))?;
        let mut set = lock(&entry.set);

        let at = Utc::now();
        let outcome = set.remove_member(record, at)?;

        let mut record_ids = vec![record.clone()];
        let collapsed = match &outcome {
            RemoveOutcome::Collapsed { remaining } => {
                record_ids.push(remaining.clone());
                true
            }
            RemoveOutcome::Shrunk { .. } => false,
        };

        debug!(set = %id, record = %record, collapsed, "removed member from duplicate set");
        self.audit.record(AuditEvent {
            set_id: id,
            action: AuditAction::RemoveMember { collapsed },
            record_ids,
            at,
        });
        Ok(outcome)
    }
}

/// Members of merged or ignored sets that have not been re-included.
fn resolved_members(
    sets: &BTreeMap<SetId, Entry>,
    reincluded: &HashSet<RecordId>,
) -> HashSet<RecordId> {
    sets.values()
        .map(|entry| lock(&entry.set))
        .filter(|set| set.status().is_terminal())
        .flat_map(|set| set.members().to_vec())
        .filter(|id| !reincluded.contains(id))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}
