use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::Utc;
use dupescope_core::{
    DupescopeError, DuplicateSet, EngineConfig, MatchConfig, PairScore, PassId, Record, RecordId,
    Result, SetId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blocking::Blocks;
use crate::cancel::CancelToken;
use crate::matcher::{NormalizedRecord, RecordMatcher};

/// Output of a completed detection pass.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub pass: PassId,
    /// Pending sets ordered by lowest member id.
    pub sets: Vec<DuplicateSet>,
    /// Every pair that reached the threshold with at least one compared
    /// field, ordered by `(a, b)`.
    pub pairs: Vec<PairScore>,
    /// Number of pairs actually scored.
    pub compared: usize,
    /// Set similarities only cover measured pairs when blocking was on.
    pub approximate_similarity: bool,
}

/// A cancelled pass yields nothing; partial results are dropped.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    Completed(Detection),
    Cancelled,
}

impl DetectionOutcome {
    pub fn completed(self) -> Option<Detection> {
        match self {
            Self::Completed(detection) => Some(detection),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Runs the matcher over a record snapshot and groups matches into sets.
#[derive(Debug, Clone, Default)]
pub struct DuplicateClusterer {
    options: EngineConfig,
}

struct Edge {
    left: usize,
    right: usize,
    pair: PairScore,
}

/// Consecutive rows of one block, scored together between cancellation checks.
struct Batch {
    block: usize,
    rows: std::ops::Range<usize>,
}

impl DuplicateClusterer {
    pub fn new(options: EngineConfig) -> Self {
        Self { options }
    }

    fn worker_count(&self, batches: usize) -> usize {
        let configured = if self.options.workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.options.workers
        };
        configured.min(batches).max(1)
    }

    /// Detect duplicate sets among `records`, skipping `excluded` ids.
    pub fn detect(
        &self,
        records: &[Record],
        cfg: &MatchConfig,
        excluded: &HashSet<RecordId>,
        pass: PassId,
        cancel: &CancelToken,
    ) -> Result<DetectionOutcome> {
        cfg.validate()?;

        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(&record.id) {
                return Err(DupescopeError::DuplicateRecordId(record.id.clone()));
            }
        }

        let mut candidates: Vec<&Record> = records
            .iter()
            .filter(|r| !excluded.contains(&r.id))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let matcher = RecordMatcher::new(cfg);
        let normalized: Vec<NormalizedRecord> =
            candidates.iter().map(|r| matcher.normalize(r)).collect();
        let blocks = Blocks::build(&candidates, cfg);

        info!(
            pass = %pass,
            records = candidates.len(),
            excluded = records.len() - candidates.len(),
            pairs = blocks.pair_count(),
            method = %cfg.method,
            threshold = cfg.threshold,
            blocking = cfg.blocking.is_enabled(),
            "starting detection pass"
        );

        let batches = self.plan_batches(&blocks);
        let Some((edges, compared)) =
            self.score_batches(&batches, &blocks, &normalized, &matcher, cfg.threshold, cancel)
        else {
            warn!(pass = %pass, "detection pass cancelled, discarding partial results");
            return Ok(DetectionOutcome::Cancelled);
        };

        let Some(detection) =
            build_detection(pass, &edges, &blocks, &normalized, &matcher, compared, cancel)
        else {
            warn!(pass = %pass, "detection pass cancelled while building sets");
            return Ok(DetectionOutcome::Cancelled);
        };
        info!(
            pass = %pass,
            compared,
            matched_pairs = detection.pairs.len(),
            sets = detection.sets.len(),
            "detection pass finished"
        );
        Ok(DetectionOutcome::Completed(detection))
    }

    fn plan_batches(&self, blocks: &Blocks) -> Vec<Batch> {
        let batch_size = self.options.batch_size.max(1);
        let mut batches = Vec::new();

        for (block_idx, members) in blocks.blocks().iter().enumerate() {
            let mut start = 0;
            let mut pending = 0;
            for row in 0..members.len() {
                pending += members.len() - row - 1;
                if pending >= batch_size {
                    batches.push(Batch {
                        block: block_idx,
                        rows: start..row + 1,
                    });
                    start = row + 1;
                    pending = 0;
                }
            }
            if pending > 0 {
                batches.push(Batch {
                    block: block_idx,
                    rows: start..members.len(),
                });
            }
        }

        batches
    }

    /// Score all batches across worker threads. `None` when cancelled.
    fn score_batches(
        &self,
        batches: &[Batch],
        blocks: &Blocks,
        normalized: &[NormalizedRecord],
        matcher: &RecordMatcher,
        threshold: f64,
        cancel: &CancelToken,
    ) -> Option<(Vec<Edge>, usize)> {
        let next = AtomicUsize::new(0);
        let next = &next;
        let workers = self.worker_count(batches.len());

        let results: Vec<(Vec<Edge>, usize)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut edges = Vec::new();
                        let mut compared = 0;
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(batch) = batches.get(idx) else { break };
                            if cancel.is_cancelled() {
                                break;
                            }

                            let members = &blocks.blocks()[batch.block];
                            for row in batch.rows.clone() {
                                let left = members[row];
                                for &right in &members[row + 1..] {
                                    let pair =
                                        matcher.match_normalized(&normalized[left], &normalized[right]);
                                    compared += 1;
                                    if pair.has_evidence() && pair.score >= threshold {
                                        edges.push(Edge { left, right, pair });
                                    }
                                }
                            }
                            debug!(batch = idx, of = batches.len(), "scored batch");
                        }
                        (edges, compared)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });

        if cancel.is_cancelled() {
            return None;
        }

        let mut compared = 0;
        let mut edges = Vec::new();
        for (mut worker_edges, worker_compared) in results {
            compared += worker_compared;
            edges.append(&mut worker_edges);
        }
        Some((edges, compared))
    }
}

fn build_detection(
    pass: PassId,
    edges: &[Edge],
    blocks: &Blocks,
    normalized: &[NormalizedRecord],
    matcher: &RecordMatcher,
    compared: usize,
    cancel: &CancelToken,
) -> Option<Detection> {
    let mut dsu = DisjointSet::new(normalized.len());
    let mut edge_pairs: HashMap<(usize, usize), &PairScore> = HashMap::with_capacity(edges.len());
    for edge in edges {
        dsu.union(edge.left, edge.right);
        edge_pairs.insert(ordered(edge.left, edge.right), &edge.pair);
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..normalized.len() {
        let root = dsu.find(idx);
        components.entry(root).or_default().push(idx);
    }

    // Candidate indices follow id order, so the first index is the lowest id.
    let mut groups: Vec<Vec<usize>> = components
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();
    for members in &mut groups {
        members.sort_unstable();
    }
    groups.sort_by_key(|members| members[0]);

    let created_at = Utc::now();
    let mut sets = Vec::with_capacity(groups.len());
    for (seq, members) in groups.iter().enumerate() {
        let measured = measured_pairs(members, blocks, &edge_pairs, normalized, matcher, cancel)?;
        sets.push(DuplicateSet::new(
            SetId::new(pass, seq as u32 + 1),
            members.iter().map(|idx| normalized[*idx].id.clone()).collect(),
            measured,
            created_at,
        ));
    }

    let mut pairs: Vec<PairScore> = edges.iter().map(|e| e.pair.clone()).collect();
    pairs.sort_by(|x, y| (&x.a, &x.b).cmp(&(&y.a, &y.b)));

    Some(Detection {
        pass,
        sets,
        pairs,
        compared,
        approximate_similarity: blocks.blocks().len() > 1,
    })
}

/// Every measured pair inside a component that carries evidence.
///
/// Pairs chained in through other members may sit below the threshold, so
/// non-edge pairs are rescored. Pairs with no comparable field say nothing
/// about the set and are left out. `None` when cancelled.
fn measured_pairs(
    members: &[usize],
    blocks: &Blocks,
    edge_pairs: &HashMap<(usize, usize), &PairScore>,
    normalized: &[NormalizedRecord],
    matcher: &RecordMatcher,
    cancel: &CancelToken,
) -> Option<Vec<PairScore>> {
    let mut measured = Vec::new();
    for (pos, &left) in members.iter().enumerate() {
        if cancel.is_cancelled() {
            return None;
        }
        for &right in &members[pos + 1..] {
            if !blocks.is_measured(left, right) {
                continue;
            }
            let pair = match edge_pairs.get(&ordered(left, right)) {
                Some(pair) => (*pair).clone(),
                None => matcher.match_normalized(&normalized[left], &normalized[right]),
            };
            if pair.has_evidence() {
                measured.push(pair);
            }
        }
    }
    Some(measured)
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) {
        let left_root = self.find(left);
        let right_root = self.find(right);
        if left_root == right_root {
            return;
        }

        match self.rank[left_root].cmp(&self.rank[right_root]) {
            std::cmp::Ordering::Less => self.parent[left_root] = right_root,
            std::cmp::Ordering::Greater => self.parent[right_root] = left_root,
            std::cmp::Ordering::Equal => {
                self.parent[right_root] = left_root;
                self.rank[left_root] += 1;
            }
        }
    }
}
