//! Group assembler
//!
//! Pure transform from a patient's ordered, normalized field rows to the
//! automation group rows: one group row per field row, same order.
//!
//! - `ASGroup<n>`: `n` is the 1-based rank of the field's site id among the
//!   distinct site ids, in first-seen order.
//! - `FIELDORDER` is the 1-based position across the whole patient, never
//!   reset per group.
//! - A compound field id `<position>_<subposition>` yields
//!   `IMGroup<position column>` and the text after the first `_` as the
//!   sub-position; plain ids get no subgroup and sub-position `"0"`.

use rtwiz_common::{FieldRecord, GroupRecord};
use std::collections::HashMap;

pub const GROUP_PREFIX: &str = "ASGroup";
pub const SUBGROUP_PREFIX: &str = "IMGroup";
pub const COMPOUND_SEPARATOR: char = '_';
pub const DEFAULT_SUB_POSITION: &str = "0";
pub const DEFAULT_MLC_TOLERANCE: &str = "2";

/// Split a compound field id at its first separator
///
/// Returns the text after the separator verbatim, further separators
/// included.
pub fn split_compound(field_id: &str) -> Option<(&str, &str)> {
    field_id.split_once(COMPOUND_SEPARATOR)
}

/// Derive one group row per field row, preserving input order
pub fn assemble_groups(fields: &[FieldRecord]) -> Vec<GroupRecord> {
    let mut site_ranks: HashMap<i64, usize> = HashMap::new();

    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let next_rank = site_ranks.len() + 1;
            let rank = *site_ranks.entry(field.site_id).or_insert(next_rank);
            build_group(field, rank, index + 1)
        })
        .collect()
}

fn build_group(field: &FieldRecord, site_rank: usize, field_order: usize) -> GroupRecord {
    let (sub_group, sub_position) = match split_compound(&field.field_id) {
        Some((_, sub_position)) => (
            format!("{}{}", SUBGROUP_PREFIX, field.position),
            sub_position.to_string(),
        ),
        None => (String::new(), DEFAULT_SUB_POSITION.to_string()),
    };

    GroupRecord {
        patient_id: field.patient_id,
        plan_id: field.plan_id,
        site_id: field.site_id,
        field_id: field.field_id.clone(),
        group_name: format!("{}{}", GROUP_PREFIX, site_rank),
        sub_group,
        position: field.position.clone(),
        sub_position,
        is_im_group: 0,
        is_interrupt: 0,
        int_description: None,
        port_type: 0,
        double_exp: 0,
        port1: 0,
        port2: 0,
        port1_pos: 0,
        port2_pos: 0,
        field_order: field_order as i64,
        open_date: None,
        close_date: None,
        hr_group: None,
        prev_field_name: None,
        mlc_tolerance: DEFAULT_MLC_TOLERANCE.to_string(),
    }
}
