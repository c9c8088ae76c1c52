//! Recipe matching across the inputs of a generic node.
//!
//! Matching is split in two steps so that competing recipes never partially
//! consume a buffer: [`find_match`] decides on queue contents alone, then
//! [`consume`] takes exactly the ingredients of the chosen recipe.

use std::collections::BTreeMap;
use std::sync::MutexGuard;

use crate::buffer::BufferState;
use crate::item::Item;
use crate::model::Combination;

/// Returns the index of the first recipe whose ingredients are all
/// available.
pub(crate) fn find_match<K>(available: &BTreeMap<K, usize>, combinations: &[Combination]) -> Option<usize>
where
    K: std::borrow::Borrow<str> + Ord,
{
    combinations.iter().position(|combination| {
        combination.ingredients.iter().all(|ingredient| {
            let count = available.get(ingredient.type_id.as_str()).copied().unwrap_or(0);
            count >= combination.required(&ingredient.type_id)
        })
    })
}

/// Counts queued items by type across several locked buffers.
pub(crate) fn available<'a>(guards: &'a [MutexGuard<'_, BufferState>]) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for guard in guards {
        for (type_key, count) in guard.queued_by_type() {
            *counts.entry(type_key).or_default() += count;
        }
    }

    counts
}

/// Takes the ingredients of a recipe out of the locked buffers.
///
/// Buffers are scanned in order, front to back. Items whose type is still
/// needed are removed along with their bookkeeping; other items stay in
/// place, in their original order. Each consumed item is returned with the
/// index of the buffer it came from.
///
/// The recipe must have been matched against the same guards beforehand.
pub(crate) fn consume(
    guards: &mut [MutexGuard<'_, BufferState>],
    combination: &Combination,
) -> Vec<(usize, Item)> {
    let mut outstanding: BTreeMap<&str, usize> = BTreeMap::new();
    for ingredient in &combination.ingredients {
        *outstanding.entry(ingredient.type_id.as_str()).or_default() += ingredient.quantity;
    }
    let mut remaining: usize = outstanding.values().sum();
    let mut consumed = Vec::with_capacity(remaining);

    for (idx, guard) in guards.iter_mut().enumerate() {
        if remaining == 0 {
            break;
        }
        let mut kept = Vec::new();
        while remaining > 0 {
            let Some(item) = guard.items.pop_front() else {
                break;
            };
            match outstanding.get_mut(item.type_key()) {
                Some(needed) if *needed > 0 => {
                    *needed -= 1;
                    remaining -= 1;
                    guard.discount(&item);
                    consumed.push((idx, item));
                }
                _ => kept.push(item),
            }
        }
        for item in kept.into_iter().rev() {
            guard.items.push_front(item);
        }
    }

    consumed
}

/// Builds the outputs of a recipe from the first consumed item.
pub(crate) fn build_outputs(
    node: &str,
    combination: &Combination,
    first: &Item,
    output_type_name: String,
    counter: &mut u64,
) -> Vec<Item> {
    (0..combination.output_quantity)
        .map(|_| {
            let id = format!("{node}_combo_{counter}");
            *counter += 1;

            first
                .derive(id)
                .with_type(Some(combination.output_type.clone()), Some(output_type_name.clone()))
        })
        .collect()
}
