use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PairScore, RecordId};
use crate::error::{DupescopeError, Result};

/// Identifier of one detection pass. Every pass gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassId(pub u64);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Duplicate set id, unique across passes: `dup-<pass>-<seq>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SetId {
    pub pass: PassId,
    pub seq: u32,
}

impl SetId {
    pub fn new(pass: PassId, seq: u32) -> Self {
        Self { pass, seq }
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dup-{}-{}", self.pass, self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Pending,
    Merged,
    Ignored,
}

impl SetStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Merged => "merged",
            Self::Ignored => "ignored",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// An operator marked the records as not duplicates.
    Dismissed,
    /// Member removal left fewer than two records.
    Collapsed,
}

/// Lifecycle of a duplicate set. `Merged` and `Ignored` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SetState {
    Pending,
    Merged {
        record: MergedRecord,
        at: DateTime<Utc>,
    },
    Ignored {
        reason: IgnoreReason,
        at: DateTime<Utc>,
    },
}

impl SetState {
    pub fn status(&self) -> SetStatus {
        match self {
            Self::Pending => SetStatus::Pending,
            Self::Merged { .. } => SetStatus::Merged,
            Self::Ignored { .. } => SetStatus::Ignored,
        }
    }
}

/// Result of removing a member from a pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// The set is still pending with `remaining` members.
    Shrunk { remaining: usize },
    /// The set fell below two members and is now ignored.
    Collapsed { remaining: RecordId },
}

/// One canonical record produced from a merged duplicate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub set_id: SetId,
    pub members: Vec<RecordId>,
    pub fields: BTreeMap<String, String>,
    /// Field name → member record that supplied the value.
    pub provenance: BTreeMap<String, RecordId>,
}

impl MergedRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn source_of(&self, name: &str) -> Option<&RecordId> {
        self.provenance.get(name)
    }
}

/// A cluster of records judged similar enough to warrant review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSet {
    id: SetId,
    members: Vec<RecordId>,
    state: SetState,
    similarity: f64,
    /// Scored pairs between current members that had a comparable field.
    #[serde(default)]
    measured: Vec<PairScore>,
    created_at: DateTime<Utc>,
}

impl DuplicateSet {
    /// Create a pending set from its members and the pairs measured between
    /// them. Members are sorted and de-duplicated.
    pub fn new(
        id: SetId,
        mut members: Vec<RecordId>,
        measured: Vec<PairScore>,
        created_at: DateTime<Utc>,
    ) -> Self {
        members.sort();
        members.dedup();
        Self {
            id,
            members,
            state: SetState::Pending,
            similarity: min_score(&measured),
            measured,
            created_at,
        }
    }

    pub fn id(&self) -> SetId {
        self.id
    }

    pub fn members(&self) -> &[RecordId] {
        &self.members
    }

    pub fn contains(&self, record: &RecordId) -> bool {
        self.members.binary_search(record).is_ok()
    }

    pub fn state(&self) -> &SetState {
        &self.state
    }

    pub fn status(&self) -> SetStatus {
        self.state.status()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == SetStatus::Pending
    }

    /// Minimum measured pairwise score among the current members, 0.0 when
    /// no two of them were directly comparable.
    pub fn similarity(&self) -> f64 {
        self.similarity
    }

    pub fn measured_pairs(&self) -> &[PairScore] {
        &self.measured
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn merged_record(&self) -> Option<&MergedRecord> {
        match &self.state {
            SetState::Merged { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn ensure_pending(&self, action: &'static str) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(DupescopeError::InvalidTransition {
                set: self.id,
                status: self.status(),
                action,
            })
        }
    }

    /// `Pending → Merged`.
    pub fn mark_merged(&mut self, record: MergedRecord, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("merge")?;
        self.state = SetState::Merged { record, at };
        Ok(())
    }

    /// `Pending → Ignored`.
    pub fn mark_ignored(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("ignore")?;
        self.state = SetState::Ignored {
            reason: IgnoreReason::Dismissed,
            at,
        };
        Ok(())
    }

    /// Drop one member. Leaves the set untouched on error.
    pub fn remove_member(&mut self, record: &RecordId, at: DateTime<Utc>) -> Result<RemoveOutcome> {
        self.ensure_pending("remove member from")?;
        let idx = self
            .members
            .binary_search(record)
            .map_err(|_| DupescopeError::MemberNotFound {
                set: self.id,
                record: record.clone(),
            })?;

        self.members.remove(idx);
        self.measured.retain(|pair| !pair.involves(record));
        self.similarity = min_score(&self.measured);
        if self.members.len() >= 2 {
            return Ok(RemoveOutcome::Shrunk {
                remaining: self.members.len(),
            });
        }

        self.state = SetState::Ignored {
            reason: IgnoreReason::Collapsed,
            at,
        };
        Ok(RemoveOutcome::Collapsed {
            remaining: self.members[0].clone(),
        })
    }
}

fn min_score(pairs: &[PairScore]) -> f64 {
    pairs
        .iter()
        .map(|pair| pair.score)
        .reduce(f64::min)
        .unwrap_or(0.0)
}
