//! Read-only queries over a policy snapshot

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::snapshot::{Handler, HandlerId, Instance, InstanceId, Snapshot};

/// Instances feeding each handler, keyed by handler index
///
/// Instance order within a handler's list is unspecified.
pub type HandlerInstances = HashMap<HandlerId, Vec<InstanceId>>;

/// Group every instance referenced by an action under that action's handler.
///
/// A handler reached from several actions, in one rule or many, gets the
/// union of their instances. Deduplication is by arena index, so two
/// separately added instances with identical content both appear.
pub fn instances_grouped_by_handler(snapshot: &Snapshot) -> HandlerInstances {
    let mut sets: HashMap<HandlerId, HashSet<InstanceId>> = HashMap::new();

    for rule in snapshot.rules() {
        for action in &rule.actions {
            sets.entry(action.handler)
                .or_default()
                .extend(action.instances.iter().copied());
        }
    }

    debug!(
        snapshot = snapshot.id(),
        handlers = sets.len(),
        "grouped instances by handler"
    );

    sets.into_iter()
        .map(|(handler, instances)| (handler, instances.into_iter().collect()))
        .collect()
}

/// Resolve a grouping to the handler and instance objects it names.
///
/// Indices not owned by `snapshot` are skipped; a grouping computed from
/// the same snapshot never has any.
pub fn resolve<'a>(
    snapshot: &'a Snapshot,
    grouping: &HandlerInstances,
) -> Vec<(&'a Handler, Vec<&'a Instance>)> {
    grouping
        .iter()
        .filter_map(|(handler, instances)| {
            let handler = snapshot.handler(*handler)?;
            let instances = instances
                .iter()
                .filter_map(|id| snapshot.instance(*id))
                .collect();
            Some((handler, instances))
        })
        .collect()
}
