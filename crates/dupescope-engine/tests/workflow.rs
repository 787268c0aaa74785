use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dupescope_core::{
    DupescopeError, EngineConfig, MatchConfig, MatchMethod, PassId, Record, RecordId,
    RemoveOutcome, SetStatus,
};
use dupescope_engine::{
    AuditAction, CancelToken, DuplicateClusterer, MemoryAuditLog, RecordMatcher,
    ResolutionWorkflow, scorer_for,
};

fn people() -> Vec<Record> {
    vec![
        Record::new("1")
            .with_field("name", "John Smith")
            .with_field("email", "john.smith@example.com")
            .with_field("city", "New York"),
        Record::new("2")
            .with_field("name", "Jon Smith")
            .with_field("email", "jon.smith@example.com")
            .with_field("city", "New York"),
        Record::new("3")
            .with_field("name", "Sarah Williams")
            .with_field("email", "sarah.w@example.com")
            .with_field("city", "Miami"),
        Record::new("4")
            .with_field("name", "Sara Williams")
            .with_field("email", "sara.w@example.com")
            .with_field("city", "Miami"),
        Record::new("5")
            .with_field("name", "Michael Brown")
            .with_field("email", "mbrown@example.org")
            .with_absent("city"),
        Record::new("6")
            .with_field("name", "Mike Brown")
            .with_field("email", "m.brown@example.org")
            .with_field("city", "Boston"),
        Record::new("7")
            .with_field("name", "Emily Davis")
            .with_field("email", "emily@davis.net")
            .with_field("city", "Chicago"),
    ]
}

fn contact_config(method: MatchMethod, threshold: f64) -> MatchConfig {
    MatchConfig::new(method, threshold)
        .with_field("name", 1.0)
        .with_field("email", 1.0)
        .with_field("city", 0.5)
}

/// Two near-identical contacts buried in `filler` unrelated ones.
fn haystack(filler: usize) -> Vec<Record> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut word = |len: usize| -> String {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                char::from(b'a' + ((seed >> 33) % 26) as u8)
            })
            .collect()
    };

    let mut records = vec![
        Record::new("john-1")
            .with_field("name", "John Smith")
            .with_field("email", "john.smith@example.com"),
        Record::new("john-2")
            .with_field("name", "Jon Smith")
            .with_field("email", "jon.smith@example.com"),
    ];
    for i in 0..filler {
        let name = format!("{} {}", word(7), word(9));
        let email = format!("{}@{}.org", word(8), word(6));
        records.push(
            Record::new(format!("r{i:05}"))
                .with_field("name", name)
                .with_field("email", email),
        );
    }
    records
}

fn workflow() -> (ResolutionWorkflow, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let clusterer = DuplicateClusterer::new(EngineConfig {
        workers: 2,
        batch_size: 2,
    });
    (ResolutionWorkflow::new(clusterer, audit.clone()), audit)
}

/// Every unordered pair of records that ends up in the same set.
fn co_members(records: &[Record], cfg: &MatchConfig) -> HashSet<(RecordId, RecordId)> {
    let detection = DuplicateClusterer::default()
        .detect(records, cfg, &HashSet::new(), PassId(1), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();

    let mut pairs = HashSet::new();
    for set in &detection.sets {
        for (i, a) in set.members().iter().enumerate() {
            for b in &set.members()[i + 1..] {
                pairs.insert((a.clone(), b.clone()));
            }
        }
    }
    pairs
}

#[test]
fn scorers_are_symmetric_and_reflexive() {
    let samples = ["John Smith", "jon smith", "Sarah", "  Sara  W. ", "a", "Émile"];

    for method in [
        MatchMethod::Exact,
        MatchMethod::Fuzzy,
        MatchMethod::Phonetic,
        MatchMethod::Hybrid,
    ] {
        let cfg = MatchConfig::new(method, 0.5).with_field("name", 1.0);
        let scorer = scorer_for(&cfg);

        for a in samples {
            let a = dupescope_core::normalize(a, false);
            assert_eq!(scorer.score(&a, &a), 1.0, "{method} reflexive on {a:?}");
            for b in samples {
                let b = dupescope_core::normalize(b, false);
                let ab = scorer.score(&a, &b);
                assert_eq!(ab, scorer.score(&b, &a), "{method} symmetric on {a:?}/{b:?}");
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }
}

#[test]
fn record_scores_are_symmetric() {
    let records = people();
    let matcher = RecordMatcher::new(&contact_config(MatchMethod::Hybrid, 0.5));

    for a in &records {
        for b in &records {
            let ab = matcher.match_records(a, b);
            let ba = matcher.match_records(b, a);
            assert_eq!(ab.score, ba.score);
            assert_eq!(ab.a, ba.a);
        }
    }
}

#[test]
fn raising_the_threshold_only_shrinks_sets() {
    let records = people();
    let thresholds = [0.2, 0.4, 0.6, 0.75, 0.9, 1.0];

    for method in [MatchMethod::Fuzzy, MatchMethod::Hybrid] {
        let memberships: Vec<_> = thresholds
            .iter()
            .map(|t| co_members(&records, &contact_config(method, *t)))
            .collect();

        for window in memberships.windows(2) {
            assert!(
                window[1].is_subset(&window[0]),
                "{method}: {:?} not within {:?}",
                window[1],
                window[0]
            );
        }
    }
}

#[test]
fn john_smith_pair_is_clustered() {
    let records = vec![
        Record::new("R1")
            .with_field("name", "John Smith")
            .with_field("email", "john@x.com"),
        Record::new("R2")
            .with_field("name", "John Smith")
            .with_field("email", "john.smith2@x.com"),
    ];
    let cfg = MatchConfig::new(MatchMethod::Fuzzy, 0.6)
        .with_field("name", 1.0)
        .with_field("email", 1.0);

    let pair = RecordMatcher::new(&cfg).match_records(&records[0], &records[1]);
    assert_eq!(pair.per_field["name"], 1.0);
    assert!((pair.per_field["email"] - 10.0 / 17.0).abs() < 1e-9);
    assert!((pair.score - 0.794).abs() < 0.01);

    let (workflow, _) = workflow();
    let detection = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(detection.sets.len(), 1);
    assert_eq!(detection.sets[0].members().len(), 2);
    assert!((detection.sets[0].similarity() - pair.score).abs() < 1e-12);
}

#[test]
fn records_without_shared_fields_never_cluster() {
    let records = vec![
        Record::new("a").with_field("name", "John").with_absent("email"),
        Record::new("b").with_absent("name").with_field("email", "john@x.com"),
    ];
    let cfg = MatchConfig::new(MatchMethod::Exact, 0.0)
        .with_field("name", 1.0)
        .with_field("email", 1.0);

    let pair = RecordMatcher::new(&cfg).match_records(&records[0], &records[1]);
    assert_eq!(pair.score, 0.0);

    let (workflow, _) = workflow();
    let detection = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    assert!(detection.sets.is_empty());
}

#[test]
fn merge_then_ignore_is_rejected() {
    let records = people();
    let (workflow, audit) = workflow();
    let detection = workflow
        .run_pass(&records, &contact_config(MatchMethod::Fuzzy, 0.7), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let id = detection.sets[0].id();

    let merged = workflow.merge(id, &records).unwrap();
    assert_eq!(merged.set_id, id);

    let err = workflow.ignore(id).unwrap_err();
    assert!(matches!(
        err,
        DupescopeError::InvalidTransition {
            status: SetStatus::Merged,
            ..
        }
    ));
    let set = workflow.get(id).unwrap();
    assert_eq!(set.status(), SetStatus::Merged);
    assert_eq!(set.merged_record(), Some(&merged));

    let actions: Vec<_> = audit.events().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Merge]);
}

#[test]
fn preview_is_stable_until_merge() {
    let records = people();
    let (workflow, _) = workflow();
    let detection = workflow
        .run_pass(&records, &contact_config(MatchMethod::Hybrid, 0.7), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let id = detection.sets[0].id();

    let first = workflow.preview_merge(id, &records).unwrap();
    let second = workflow.preview_merge(id, &records).unwrap();
    assert_eq!(first, second);
    assert_eq!(workflow.merge(id, &records).unwrap(), first);
}

#[test]
fn removing_from_a_pair_collapses_without_merge() {
    let records = vec![
        Record::new("a").with_field("name", "Sarah Williams"),
        Record::new("b").with_field("name", "Sara Williams"),
    ];
    let cfg = MatchConfig::new(MatchMethod::Fuzzy, 0.8).with_field("name", 1.0);
    let (workflow, audit) = workflow();
    let detection = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let id = detection.sets[0].id();

    let outcome = workflow.remove_member(id, &RecordId::from("b")).unwrap();
    assert!(matches!(outcome, RemoveOutcome::Collapsed { .. }));

    let set = workflow.get(id).unwrap();
    assert_eq!(set.status(), SetStatus::Ignored);
    assert!(set.merged_record().is_none());
    assert_eq!(
        audit.events()[0].action,
        AuditAction::RemoveMember { collapsed: true }
    );
}

#[test]
fn resolved_records_stay_out_of_later_passes() {
    let records = people();
    let cfg = contact_config(MatchMethod::Fuzzy, 0.7);
    let (workflow, _) = workflow();

    let first = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let resolved = first.sets[0].clone();
    workflow.ignore(resolved.id()).unwrap();

    let second = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    assert!(second.pass > first.pass);
    for set in &second.sets {
        for member in resolved.members() {
            assert!(!set.contains(member));
        }
    }
    assert_eq!(workflow.sets_with_status(SetStatus::Ignored).len(), 1);
}

#[test]
fn cancelled_pass_registers_nothing() {
    let records = people();
    let (workflow, _) = workflow();
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = workflow
        .run_pass(&records, &contact_config(MatchMethod::Fuzzy, 0.7), &cancel)
        .unwrap();
    assert!(outcome.is_cancelled());
    assert!(workflow.sets().is_empty());
}

#[test]
fn merge_during_pass_keeps_records_out_of_pending_sets() {
    let records = haystack(800);
    let cfg = MatchConfig::new(MatchMethod::Fuzzy, 0.7)
        .with_field("name", 1.0)
        .with_field("email", 1.0);
    let audit = Arc::new(MemoryAuditLog::new());
    let workflow = ResolutionWorkflow::new(
        DuplicateClusterer::new(EngineConfig {
            workers: 1,
            batch_size: 256,
        }),
        audit,
    );

    let first = workflow
        .run_pass(&records, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let john = first
        .sets
        .iter()
        .find(|set| set.contains(&"john-1".into()))
        .unwrap()
        .id();

    let second = thread::scope(|scope| {
        let pass = scope.spawn(|| workflow.run_pass(&records, &cfg, &CancelToken::new()));
        thread::sleep(Duration::from_millis(20));
        // The new pass may already have superseded the set.
        match workflow.merge(john, &records) {
            Ok(_) | Err(DupescopeError::SetNotFound(_)) => {}
            Err(err) => panic!("unexpected merge error: {err}"),
        }
        pass.join().unwrap()
    });
    assert!(second.unwrap().completed().is_some());

    let merged: Vec<RecordId> = workflow
        .sets_with_status(SetStatus::Merged)
        .iter()
        .flat_map(|set| set.members().to_vec())
        .collect();
    for set in workflow.sets_with_status(SetStatus::Pending) {
        for id in &merged {
            assert!(!set.contains(id), "{id} is merged but pending in {}", set.id());
        }
    }
}

#[test]
fn cancelling_mid_pass_discards_partial_results() {
    let records = haystack(2000);
    let cfg = MatchConfig::new(MatchMethod::Fuzzy, 0.7)
        .with_field("name", 1.0)
        .with_field("email", 1.0);
    let workflow = ResolutionWorkflow::new(
        DuplicateClusterer::new(EngineConfig {
            workers: 1,
            batch_size: 64,
        }),
        Arc::new(MemoryAuditLog::new()),
    );

    let small = &records[..50];
    let first = workflow
        .run_pass(small, &cfg, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(first.sets.len(), 1);

    let cancel = CancelToken::new();
    let outcome = thread::scope(|scope| {
        let pass = scope.spawn(|| workflow.run_pass(&records, &cfg, &cancel));
        thread::sleep(Duration::from_millis(10));
        cancel.cancel();
        pass.join().unwrap()
    })
    .unwrap();

    assert!(outcome.is_cancelled());
    let sets = workflow.sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].id(), first.sets[0].id());
    assert!(sets[0].is_pending());
}
