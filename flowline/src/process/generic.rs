//! Processing machines.

use std::sync::Arc;

use rand::Rng;
use tracing::Instrument;

use super::sync::{race, take_all, take_recipe};
use super::{Context, ProcessResult};
use crate::combination;
use crate::hooks::MachineState;
use crate::item::Item;
use crate::model::{GenericConfig, SyncMode, TieBreak};
use crate::operator::{find_operator_for_machine, wait_for_operator};
use crate::stats::TimeProbeKind;

/// Retry delay after a collection that yielded no item.
const EMPTY_RETRY: f64 = 0.1;

/// Items collected for one processing cycle.
enum Collected {
    /// Input items, processed into outputs by the node itself.
    Plain(Vec<Item>),
    /// Results of a recipe.
    Recipe { outputs: Vec<Item> },
}

impl Collected {
    fn first(&self) -> Option<&Item> {
        match self {
            Self::Plain(items) | Self::Recipe { outputs: items } => items.first(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Plain(items) | Self::Recipe { outputs: items } => items.len(),
        }
    }
}

/// Runs processing cycles: collect inputs, get the operator and the
/// machine, process, then emit outputs on every output connection.
pub(super) async fn run(ctx: Arc<Context>, node: usize, config: GenericConfig) -> ProcessResult {
    let node_id = ctx.node_id(node).to_string();
    let inputs = ctx.state.model.input_indices(&node_id);
    let outputs = ctx.state.model.output_indices(&node_id);
    let Some(machine) = ctx.state.nodes[node].resource.clone() else {
        return Ok(());
    };
    let required: Vec<(usize, usize)> = match &config.sync {
        SyncMode::WaitN(wait) => inputs
            .iter()
            .map(|&conn| {
                let id = ctx.state.buffers[conn].id();
                (conn, wait.required.get(id).copied().unwrap_or(1))
            })
            .collect(),
        SyncMode::FirstAvailable(_) => Vec::new(),
    };

    let mut next_input = 0;
    let mut recipe_outputs = 0;
    let mut emitted = 0;
    let mut last_departure = ctx.now();

    while ctx.is_running() {
        let wait_start = ctx.now();
        let collected = match &config.sync {
            SyncMode::FirstAvailable(TieBreak::RoundRobin) => {
                let conn = inputs[next_input % inputs.len()];
                next_input += 1;
                Collected::Plain(vec![ctx.receive(node, conn).await?])
            }
            SyncMode::FirstAvailable(tie_break) => {
                let (_, item) = race(&ctx, node, &inputs, *tie_break).await?;
                Collected::Plain(vec![item])
            }
            SyncMode::WaitN(_) if config.uses_combinations() => {
                let (matched, consumed) = take_recipe(&ctx, node, &inputs, &config.combinations).await?;
                let recipe = &config.combinations[matched];
                let type_name = ctx.state.model.item_type_name(Some(&recipe.output_type));
                let outputs = match consumed.first() {
                    Some((_, first)) => {
                        combination::build_outputs(&node_id, recipe, first, type_name, &mut recipe_outputs)
                    }
                    None => Vec::new(),
                };
                Collected::Recipe { outputs }
            }
            SyncMode::WaitN(_) => {
                let taken = take_all(&ctx, node, &required).await?;
                Collected::Plain(taken.into_iter().map(|(_, item)| item).collect())
            }
        };

        let Some(first) = collected.first().cloned() else {
            ctx.scheduler.timeout(EMPTY_RETRY).await;
            continue;
        };
        ctx.state.stats.record_waiting(&node_id, ctx.now() - wait_start);

        let claim = match find_operator_for_machine(&ctx.state, &node_id) {
            Some(operator) => {
                let span = tracing::debug_span!("operator", id = ctx.state.operators[operator].id());
                Some(wait_for_operator(&ctx, operator, &node_id).instrument(span).await?)
            }
            None => None,
        };
        let permit = machine.acquire().await?;

        ctx.set_active(node, true);
        let attended = claim.as_ref().map_or(true, |claim| claim.is_at(&node_id));
        if attended {
            ctx.set_machine(node, MachineState::On);
        }

        let duration = first
            .item_type
            .as_deref()
            .and_then(|t| config.processing_time_by_type.get(t))
            .unwrap_or(&config.processing_time)
            .sample();
        tracing::debug!(item = %first.id, duration, "processing");
        ctx.scheduler.timeout(duration).await;

        let now = ctx.now();
        let stats = &ctx.state.stats;
        stats.record_time_sample(&node_id, TimeProbeKind::Processing, duration);
        stats.record_time_sample(&node_id, TimeProbeKind::InterEvents, now - last_departure);
        stats.record_processed(&node_id, collected.len());
        last_departure = now;

        let (quantity, extra, output_type) = match (&collected, &config.sync) {
            (Collected::Recipe { outputs }, _) => (outputs.len(), false, first.item_type.clone()),
            (Collected::Plain(_), SyncMode::WaitN(wait)) => (
                wait.output_quantity,
                false,
                wait.output_type.clone().or_else(|| first.item_type.clone()),
            ),
            (Collected::Plain(_), SyncMode::FirstAvailable(_)) => {
                let multiplier = config.output_multiplier;
                let whole = multiplier.trunc();
                let fraction = multiplier - whole;
                let extra = fraction > 0.0 && rand::thread_rng().gen::<f64>() < fraction;
                let output_type = first
                    .item_type
                    .as_deref()
                    .and_then(|t| config.output_type_by_type.get(t))
                    .cloned()
                    .or_else(|| first.item_type.clone());

                (whole as usize, extra, output_type)
            }
        };
        let output_type_name = output_type
            .as_deref()
            .map(|t| ctx.state.model.item_type_name(Some(t)));

        for &conn in &outputs {
            let units = [quantity, usize::from(extra)];
            for units in units.into_iter().filter(|&u| u > 0) {
                let token = first
                    .derive(format!("{node_id}_out_{emitted}"))
                    .with_type(output_type.clone(), output_type_name.clone())
                    .with_quantity(units);
                emitted += 1;
                ctx.hooks.departure(ctx.now(), &node_id, &token);
                ctx.transfer(node, conn, token).await?;
            }
        }

        ctx.set_active(node, false);
        if attended {
            ctx.set_machine(node, MachineState::Off);
        }
        if let Some(claim) = claim {
            claim.release(&ctx);
        }
        drop(permit);
    }

    Ok(())
}
