use std::collections::{BTreeMap, HashMap};

use dupescope_core::{
    DupescopeError, MergedRecord, Record, RecordId, Result, SetId, normalize,
};

/// Build one canonical record from the members of a set.
///
/// For every field the member with the longest non-empty normalized value
/// wins; ties go to the lowest record id. The winning member's original
/// value is kept (trimmed) and recorded as the field's provenance. Fields
/// absent on every member stay absent.
pub fn merge_records(
    set_id: SetId,
    members: &[RecordId],
    records: &HashMap<&RecordId, &Record>,
    case_sensitive: bool,
) -> Result<MergedRecord> {
    let mut sources: Vec<&Record> = members
        .iter()
        .map(|id| {
            records
                .get(id)
                .copied()
                .ok_or_else(|| DupescopeError::RecordNotFound(id.clone()))
        })
        .collect::<Result<_>>()?;
    sources.sort_by(|a, b| a.id.cmp(&b.id));

    // (normalized length, value, source) of the current winner per field.
    let mut best: BTreeMap<&str, (usize, &str, &RecordId)> = BTreeMap::new();
    for record in &sources {
        for (name, value) in &record.fields {
            let Some(raw) = value.as_deref() else { continue };
            let len = normalize(raw, case_sensitive).chars().count();
            if len == 0 {
                continue;
            }
            // Strictly longer only: earlier (lower id) members win ties.
            let wins = best
                .get(name.as_str())
                .is_none_or(|(current, _, _)| len > *current);
            if wins {
                best.insert(name.as_str(), (len, raw.trim(), &record.id));
            }
        }
    }

    let mut fields = BTreeMap::new();
    let mut provenance = BTreeMap::new();
    for (name, (_, value, source)) in best {
        fields.insert(name.to_string(), value.to_string());
        provenance.insert(name.to_string(), source.clone());
    }

    Ok(MergedRecord {
        set_id,
        members: sources.iter().map(|r| r.id.clone()).collect(),
        fields,
        provenance,
    })
}

/// Index a record snapshot by id.
pub fn index_records(records: &[Record]) -> HashMap<&RecordId, &Record> {
    records.iter().map(|r| (&r.id, r)).collect()
}
