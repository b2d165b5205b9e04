//! Constant-volume bin packing (first fit decreasing)

use super::Item;
use crate::types::ByteSize;

/// Pack `items` into bins whose total size never exceeds `volume`.
///
/// Items are placed largest first, ties broken by path. Every item must fit
/// into an empty bin. Within a bin, items end up sorted by path, and bins are
/// ordered by their smallest member path.
pub fn pack(mut items: Vec<Item>, volume: ByteSize) -> Vec<Vec<Item>> {
    items.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

    let mut bins: Vec<(ByteSize, Vec<Item>)> = Vec::new();
    for item in items {
        debug_assert!(item.size <= volume);
        match bins
            .iter_mut()
            .find(|(total, _)| total + item.size <= volume)
        {
            Some((total, members)) => {
                *total += item.size;
                members.push(item);
            }
            None => bins.push((item.size, vec![item])),
        }
    }

    let mut bins: Vec<Vec<Item>> = bins
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| a.path.cmp(&b.path));
            members
        })
        .collect();
    bins.sort_by(|a, b| a[0].path.cmp(&b[0].path));
    bins
}
