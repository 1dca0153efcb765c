//! Dimension deduplicator.
//!
//! Merges the attribute frames of one dimension into exactly one canonical row
//! per natural key. The winning candidate for a key is, in order:
//!
//! 1. the one with the most non-missing attributes;
//! 2. on a tie, the one from the earliest source in the source-priority order;
//! 3. on a tie within one source, the lexicographically smallest payload.
//!
//! None of the rules depends on row order inside a relation, so two rebuilds
//! over the same sources always pick the same winners. Placeholders for blank
//! attributes are filled and text attributes normalised only after selection.
//! The output is sorted by natural key, which fixes the order surrogate ids are
//! assigned in.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{
  dimension::{AttrType, DimensionRow, DimensionSpec, NaturalKey},
  extract::AttributeFrame,
  value::{Value, title_case_if_upper, total_cmp},
};

fn payload_cmp(a: &DimensionRow, b: &DimensionRow) -> Ordering {
  a.values
    .iter()
    .zip(&b.values)
    .map(|(x, y)| total_cmp(x, y))
    .find(|o| o.is_ne())
    .unwrap_or(Ordering::Equal)
}

/// Whether `challenger` beats `incumbent` when both come from the same source.
fn beats_within_source(challenger: &DimensionRow, incumbent: &DimensionRow) -> bool {
  match challenger.completeness().cmp(&incumbent.completeness()) {
    Ordering::Greater => true,
    Ordering::Less => false,
    Ordering::Equal => payload_cmp(challenger, incumbent).is_lt(),
  }
}

/// Reduce candidates from a single relation to the best one per natural key,
/// sorted by key.
pub(crate) fn compact(rows: Vec<DimensionRow>) -> Vec<DimensionRow> {
  let mut best: BTreeMap<NaturalKey, DimensionRow> = BTreeMap::new();
  for row in rows {
    match best.get(&row.key) {
      Some(current) if !beats_within_source(&row, current) => {}
      _ => {
        best.insert(row.key.clone(), row);
      }
    }
  }
  best.into_values().collect()
}

/// Merge `frames` into one canonical row per natural key, sorted by key.
pub fn deduplicate(spec: &DimensionSpec, frames: &[AttributeFrame]) -> Vec<DimensionRow> {
  let mut ordered: Vec<&AttributeFrame> = frames.iter().collect();
  // Stable: frames from the same relation keep their role order.
  ordered.sort_by_key(|f| f.priority);

  let mut best: BTreeMap<NaturalKey, DimensionRow> = BTreeMap::new();
  for frame in ordered {
    for row in &frame.rows {
      match best.get(&row.key) {
        // Earlier sources win ties, so only a strictly more complete
        // candidate displaces the incumbent.
        Some(current) if row.completeness() <= current.completeness() => {}
        _ => {
          best.insert(row.key.clone(), row.clone());
        }
      }
    }
  }

  best
    .into_values()
    .map(|mut row| {
      if let Some(fill) = spec.fill {
        fill(&mut row.values);
      }
      normalize_labels(spec, &mut row);
      row
    })
    .collect()
}

/// Apply label canonicalisation and the title-case heuristic to the text
/// attributes of `row`.
pub fn normalize_labels(spec: &DimensionSpec, row: &mut DimensionRow) {
  for (attr, value) in spec.attributes.iter().zip(row.values.iter_mut()) {
    let Value::Text(text) = value else { continue };
    let normalized = match attr.ty {
      AttrType::Integer => continue,
      AttrType::Text => title_case_if_upper(text),
      AttrType::Label(table) => table.canonicalize(text),
    };
    *text = normalized;
  }
}
