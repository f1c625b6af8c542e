use crate::record::StatusRecord;
use std::cmp::Ordering;

/// Host (case-insensitive, folded per character), then slot ascending.
///
/// Ties fall back to exact host bytes and source path so that the order does
/// not depend on directory enumeration order.
pub fn compare_records(a: &StatusRecord, b: &StatusRecord) -> Ordering {
    compare_hosts(&a.host, &b.host)
        .then_with(|| a.slot.cmp(&b.slot))
        .then_with(|| a.host.cmp(&b.host))
        .then_with(|| a.source_path.cmp(&b.source_path))
}

pub fn sort_records(records: &mut [StatusRecord]) {
    records.sort_by(compare_records);
}

fn compare_hosts(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
