use archivum_domain::{DataElement, DataGroup, ListFilter};

/// Returns `(offset, limit)` for the 1-based inclusive window of `filter` over `total` matches.
pub(crate) fn window_bounds(filter: &ListFilter, total: u64) -> (u64, u64) {
    let from_no = filter.from_no.unwrap_or(1).max(1);
    let to_no = filter.to_no.unwrap_or(total).min(total);

    (from_no - 1, to_no.saturating_sub(from_no - 1))
}

/// Collects `(type, id)` of every record link in the tree, depth first.
pub(crate) fn linked_records(group: &DataGroup) -> Vec<(&str, &str)> {
    let mut targets = Vec::new();
    push_linked_records(group, &mut targets);
    targets
}

fn push_linked_records<'a>(group: &'a DataGroup, targets: &mut Vec<(&'a str, &'a str)>) {
    for child in group.children() {
        match child {
            DataElement::RecordLink(link) => {
                targets.push((link.linked_record_type(), link.linked_record_id()));
            }
            DataElement::Group(child_group) => push_linked_records(child_group, targets),
            DataElement::Atomic(_) | DataElement::ResourceLink(_) => {}
        }
    }
}
