//! Input collection across several buffers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::Rng;

use super::{Context, Interrupted};
use crate::buffer::BufferLevel;
use crate::combination;
use crate::item::Item;
use crate::model::{Combination, TieBreak};
use crate::util::futures::SelectReady;

/// Takes one item from whichever input has one.
///
/// Every input that is ready in the same poll gets popped; the winner is
/// picked among them according to `tie_break` and the others are returned
/// to their buffer in the background. Only the winner's consumption is
/// recorded.
pub(super) async fn race(
    ctx: &Arc<Context>,
    node: usize,
    inputs: &[usize],
    tie_break: TieBreak,
) -> Result<(usize, Item), Interrupted> {
    let mut select = SelectReady::new();
    for &conn in inputs {
        let buffer = &ctx.state.buffers[conn];
        select.push(buffer.pop());
    }

    let mut popped = Vec::with_capacity(1);
    let mut closed = false;
    for (idx, result) in select.await {
        match result {
            Ok(item) => popped.push((inputs[idx], item)),
            Err(_) => closed = true,
        }
    }
    if closed || popped.is_empty() {
        ctx.return_losers(popped);
        return Err(Interrupted);
    }

    let winner = match tie_break {
        TieBreak::Random if popped.len() > 1 => rand::thread_rng().gen_range(0..popped.len()),
        _ => 0,
    };
    let (conn, item) = popped.remove(winner);
    if !popped.is_empty() {
        tracing::trace!(losers = popped.len(), "race resolved with losers");
    }
    ctx.return_losers(popped);

    let level = ctx.state.buffers[conn].record_consumed(&item);
    ctx.record_consumption(conn, &level);
    ctx.record_arrival(node, &item);

    Ok((conn, item))
}

/// Takes exactly the required number of items from every input at once.
///
/// Nothing is taken until every input can deliver its share, so an input is
/// never partially drained.
pub(super) async fn take_all(
    ctx: &Arc<Context>,
    node: usize,
    required: &[(usize, usize)],
) -> Result<Vec<(usize, Item)>, Interrupted> {
    let taken = ctx
        .state
        .activity
        .wait_until(|| {
            let mut guards: Vec<_> = required
                .iter()
                .map(|&(conn, _)| ctx.state.buffers[conn].lock_state())
                .collect();
            if guards.iter().any(|g| g.is_closed()) {
                return Some(Err(Interrupted));
            }
            if guards.iter().any(|g| g.is_returning()) {
                return None;
            }
            let satisfied = guards
                .iter()
                .zip(required)
                .all(|(guard, &(_, count))| guard.items.len() >= count);
            if !satisfied {
                return None;
            }

            let mut taken = Vec::new();
            for (guard, &(conn, count)) in guards.iter_mut().zip(required) {
                for _ in 0..count {
                    if let Some(item) = guard.items.pop_front() {
                        guard.discount(&item);
                        taken.push((conn, item));
                    }
                }
            }

            Some(Ok(taken))
        })
        .await?;

    finish_consumption(ctx, node, &taken);

    Ok(taken)
}

/// Waits until one of the recipes can be made from the queued inputs and
/// consumes its ingredients.
///
/// All recipes are evaluated again whenever an item is put in any buffer.
/// Returns the index of the recipe and the consumed ingredients.
pub(super) async fn take_recipe(
    ctx: &Arc<Context>,
    node: usize,
    inputs: &[usize],
    combinations: &[Combination],
) -> Result<(usize, Vec<(usize, Item)>), Interrupted> {
    let (matched, consumed) = ctx
        .state
        .activity
        .wait_until(|| {
            let mut guards: Vec<_> = inputs
                .iter()
                .map(|&conn| ctx.state.buffers[conn].lock_state())
                .collect();
            if guards.iter().any(|g| g.is_closed()) {
                return Some(Err(Interrupted));
            }
            if guards.iter().any(|g| g.is_returning()) {
                return None;
            }
            let matched = combination::find_match(&combination::available(&guards), combinations)?;
            let consumed = combination::consume(&mut guards, &combinations[matched])
                .into_iter()
                .map(|(idx, item)| (inputs[idx], item))
                .collect::<Vec<_>>();

            Some(Ok((matched, consumed)))
        })
        .await?;

    tracing::debug!(
        combination = %combinations[matched].id,
        ingredients = consumed.len(),
        "combination matched"
    );
    finish_consumption(ctx, node, &consumed);

    Ok((matched, consumed))
}

/// Wakes up the drained buffers and records the consumptions.
///
/// Each consumed item gets the level its buffer had right after its own
/// removal, rebuilt backwards from the final level.
fn finish_consumption(ctx: &Context, node: usize, taken: &[(usize, Item)]) {
    let drained: BTreeSet<usize> = taken.iter().map(|(conn, _)| *conn).collect();
    let mut levels: BTreeMap<usize, BufferLevel> = drained
        .iter()
        .map(|&conn| (conn, ctx.state.buffers[conn].level()))
        .collect();
    for &conn in &drained {
        ctx.state.buffers[conn].notify_consumed();
    }

    let mut samples = Vec::with_capacity(taken.len());
    for (conn, item) in taken.iter().rev() {
        if let Some(level) = levels.get_mut(conn) {
            samples.push(level.clone());
            level.population += 1;
            *level.type_counts.entry(item.type_key().to_string()).or_default() += 1;
        }
    }
    samples.reverse();

    for ((conn, item), level) in taken.iter().zip(&samples) {
        ctx.record_consumption(*conn, level);
        ctx.record_arrival(node, item);
    }
}
