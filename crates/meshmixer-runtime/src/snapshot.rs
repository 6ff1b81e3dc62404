//! Snapshot arena of rules, actions, handlers and instances

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use meshmixer_common::{Error, Result};

/// Arena index of a handler within its snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub usize);

/// Arena index of an instance within its snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

/// Backend adapter configuration that actions dispatch to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    /// Fully qualified handler name
    pub name: String,
    /// Adapter implementing the handler (e.g., "prometheus")
    pub adapter: String,
    /// Adapter parameters
    #[serde(default)]
    pub params: Value,
}

/// Template instance: a value descriptor computed per request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Fully qualified instance name
    pub name: String,
    /// Template the instance is built from (e.g., "metric")
    pub template: String,
    /// Template parameters
    #[serde(default)]
    pub params: Value,
}

/// Feeds a set of instances to one handler
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Optional action name
    #[serde(default)]
    pub name: String,
    /// Target handler
    pub handler: HandlerId,
    /// Instances fed to the handler, in declaration order
    pub instances: Vec<InstanceId>,
}

/// Match condition plus the actions run when it holds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name
    pub name: String,
    /// Rule namespace
    #[serde(default)]
    pub namespace: String,
    /// Match expression; empty matches everything
    #[serde(default, rename = "match")]
    pub match_expr: String,
    /// Actions in declaration order
    pub actions: Vec<Action>,
}

/// Immutable policy configuration for one generation
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    id: u64,
    handlers: Vec<Handler>,
    instances: Vec<Instance>,
    rules: Vec<Rule>,
}

impl Snapshot {
    /// Snapshot generation ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handler by index
    pub fn handler(&self, id: HandlerId) -> Option<&Handler> {
        self.handlers.get(id.0)
    }

    /// Instance by index
    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.0)
    }

    /// All handlers, indexed by [`HandlerId`]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// All instances, indexed by [`InstanceId`]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Assembles a [`Snapshot`], handing out arena indices
///
/// Every `add_handler`/`add_instance` call creates a new identity, even for
/// content identical to an earlier one.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    id: u64,
    handlers: Vec<Handler>,
    instances: Vec<Instance>,
    rules: Vec<Rule>,
}

impl SnapshotBuilder {
    /// Start a snapshot for the given generation
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Add a handler, returning its index
    pub fn add_handler(&mut self, handler: Handler) -> HandlerId {
        self.handlers.push(handler);
        HandlerId(self.handlers.len() - 1)
    }

    /// Add an instance, returning its index
    pub fn add_instance(&mut self, instance: Instance) -> InstanceId {
        self.instances.push(instance);
        InstanceId(self.instances.len() - 1)
    }

    /// Append a rule
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Validate references and freeze the snapshot
    pub fn build(self) -> Result<Snapshot> {
        for (r, rule) in self.rules.iter().enumerate() {
            for (a, action) in rule.actions.iter().enumerate() {
                if action.handler.0 >= self.handlers.len() {
                    return Err(Error::validation_for_field(
                        format!("rules[{}].actions[{}].handler", r, a),
                        format!(
                            "rule {} references handler #{} but snapshot has {}",
                            rule.name,
                            action.handler.0,
                            self.handlers.len()
                        ),
                    ));
                }
                if let Some((i, bad)) = action
                    .instances
                    .iter()
                    .enumerate()
                    .find(|(_, id)| id.0 >= self.instances.len())
                {
                    return Err(Error::validation_for_field(
                        format!("rules[{}].actions[{}].instances[{}]", r, a, i),
                        format!(
                            "rule {} references instance #{} but snapshot has {}",
                            rule.name,
                            bad.0,
                            self.instances.len()
                        ),
                    ));
                }
            }
        }

        debug!(
            snapshot = self.id,
            rules = self.rules.len(),
            handlers = self.handlers.len(),
            instances = self.instances.len(),
            "built policy snapshot"
        );

        Ok(Snapshot {
            id: self.id,
            handlers: self.handlers,
            instances: self.instances,
            rules: self.rules,
        })
    }
}
