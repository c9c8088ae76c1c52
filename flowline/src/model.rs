//! Flow graph description.
//!
//! A [`FlowModel`] is the construction input of a simulation: nodes,
//! connections between them, and the operators shared by processing nodes.
//! It is plain data; [`FlowModel::validate`] checks it before any process
//! runs.

mod combination;
mod distribution;
mod item_type;
mod node;
mod operator;

use std::collections::BTreeSet;

pub use combination::{Combination, Ingredient};
pub use distribution::{Distribution, MIN_SAMPLE};
pub use item_type::{ItemType, TypePolicy};
pub use node::{
    AvailabilityCheck, GenericConfig, Node, NodeKind, SourceConfig, SplitMode, SyncMode,
    TieBreak, WaitN,
};
pub use operator::{Operator, TravelRoute};

pub(crate) use item_type::{Draw, TypeGenerator};

use crate::error::ConfigError;
use crate::item::DEFAULT_TYPE;
use crate::stats::ProbeMode;

/// A directed buffer between two nodes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Connection {
    /// Unique identifier.
    pub id: String,
    /// Upstream node.
    pub from: String,
    /// Downstream node.
    pub to: String,
    /// Maximum number of items held; unbounded if `None`.
    pub capacity: Option<usize>,
    /// Number of items present at the start of a run.
    pub initial_count: usize,
    /// Type of the initial items.
    pub initial_type: Option<String>,
    /// Buffer-level probe attached to this connection.
    pub probe: Option<ProbeMode>,
}

impl Connection {
    /// Creates an unbounded, initially empty connection.
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            capacity: None,
            initial_count: 0,
            initial_type: None,
            probe: None,
        }
    }
}

/// A flow graph.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowModel {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    operators: Vec<Operator>,
    #[cfg_attr(feature = "serde", serde(default))]
    next_node: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    next_connection: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    next_operator: usize,
}

impl FlowModel {
    /// Creates an empty flow graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with a generated identifier and returns that identifier.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> String {
        let id = format!("node_{}", self.next_node);
        self.next_node += 1;
        self.nodes.push(Node {
            id: id.clone(),
            name: name.into(),
            kind,
        });

        id
    }

    /// Adds a connection between two nodes and returns its identifier.
    ///
    /// Connections are declared in order: the inputs and outputs of a node are
    /// scanned in the order their connections were added.
    pub fn add_connection(&mut self, from: &str, to: &str) -> String {
        let id = format!("conn_{}", self.next_connection);
        self.next_connection += 1;
        self.connections.push(Connection::new(id.clone(), from, to));

        id
    }

    /// Adds an operator assigned to the specified machines and returns its
    /// identifier.
    pub fn add_operator<S: AsRef<str>>(&mut self, name: impl Into<String>, machines: &[S]) -> String {
        let id = format!("op_{}", self.next_operator);
        self.next_operator += 1;
        let machines = machines.iter().map(|m| m.as_ref().to_string()).collect();
        let mut operator = Operator::new(id.clone(), machines);
        operator.name = name.into();
        self.operators.push(operator);

        id
    }

    /// Returns all nodes, in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns all connections, in declaration order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns all operators, in declaration order.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// Returns a node by identifier.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns a mutable reference to a node.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Returns a connection by identifier.
    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Returns a mutable reference to a connection.
    pub fn connection_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    /// Returns an operator by identifier.
    pub fn operator(&self, id: &str) -> Option<&Operator> {
        self.operators.iter().find(|o| o.id == id)
    }

    /// Returns a mutable reference to an operator.
    pub fn operator_mut(&mut self, id: &str) -> Option<&mut Operator> {
        self.operators.iter_mut().find(|o| o.id == id)
    }

    /// Returns the indices of the input connections of a node.
    pub(crate) fn input_indices(&self, node: &str) -> Vec<usize> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.to == node)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Returns the indices of the output connections of a node.
    pub(crate) fn output_indices(&self, node: &str) -> Vec<usize> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.from == node)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Resolves the display name of an item type.
    ///
    /// Types are looked up in the type lists of all sources; unknown types are
    /// named after their identifier.
    pub fn item_type_name(&self, type_id: Option<&str>) -> String {
        let Some(type_id) = type_id else {
            return DEFAULT_TYPE.to_string();
        };

        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Source(source) => Some(&source.item_types),
                _ => None,
            })
            .flatten()
            .find(|t| t.id == type_id)
            .map_or_else(|| type_id.to_string(), |t| t.name.clone())
    }

    /// Checks the whole graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = BTreeSet::new();
        let all_ids = self
            .nodes
            .iter()
            .map(|n| &n.id)
            .chain(self.connections.iter().map(|c| &c.id))
            .chain(self.operators.iter().map(|o| &o.id));
        for id in all_ids {
            if !ids.insert(id.as_str()) {
                return Err(ConfigError::DuplicateId(id.clone()));
            }
        }

        for connection in &self.connections {
            self.check_connection(connection)?;
        }
        for node in &self.nodes {
            self.check_node(node)?;
        }
        for operator in &self.operators {
            self.check_operator(operator)?;
        }

        Ok(())
    }

    fn check_connection(&self, connection: &Connection) -> Result<(), ConfigError> {
        for end in [&connection.from, &connection.to] {
            if self.node(end).is_none() {
                return Err(ConfigError::UnknownNode {
                    referrer: connection.id.clone(),
                    node: end.clone(),
                });
            }
        }
        match connection.capacity {
            Some(0) => Err(ConfigError::ZeroCapacity {
                connection: connection.id.clone(),
            }),
            Some(capacity) if capacity < connection.initial_count => {
                Err(ConfigError::CapacityBelowInitial {
                    connection: connection.id.clone(),
                    capacity,
                    initial_count: connection.initial_count,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_node(&self, node: &Node) -> Result<(), ConfigError> {
        let inputs = self.input_indices(&node.id);
        let outputs = self.output_indices(&node.id);
        let arity = |reason| {
            Err(ConfigError::Arity {
                node: node.id.clone(),
                reason,
            })
        };
        let distribution = |d: &Distribution, interval: bool| {
            let checked = if interval { d.check_interval() } else { d.check() };
            checked.map_err(|reason| ConfigError::InvalidDistribution {
                owner: node.id.clone(),
                reason,
            })
        };

        match &node.kind {
            NodeKind::Source(source) => {
                if !inputs.is_empty() {
                    return arity("a source cannot have inputs");
                }
                if source.batch_size == 0 {
                    return Err(ConfigError::InvalidBatchSize {
                        node: node.id.clone(),
                    });
                }
                distribution(&source.interval, true)?;
                source
                    .type_policy
                    .check()
                    .map_err(|reason| ConfigError::InvalidTypePolicy {
                        node: node.id.clone(),
                        reason,
                    })?;
            }
            NodeKind::Sink => {
                if inputs.len() != 1 {
                    return arity("a sink must have exactly one input");
                }
                if !outputs.is_empty() {
                    return arity("a sink cannot have outputs");
                }
            }
            NodeKind::Splitter(_) => {
                if inputs.len() != 1 {
                    return arity("a splitter must have exactly one input");
                }
                if outputs.is_empty() {
                    return arity("a splitter must have at least one output");
                }
            }
            NodeKind::Merger => {
                if inputs.is_empty() {
                    return arity("a merger must have at least one input");
                }
                if outputs.len() != 1 {
                    return arity("a merger must have exactly one output");
                }
            }
            NodeKind::Generic(generic) => {
                if inputs.is_empty() {
                    return arity("a processing node must have at least one input");
                }
                if generic.capacity == 0 {
                    return arity("a processing node must have a capacity of at least one");
                }
                let multiplier = generic.output_multiplier;
                if !multiplier.is_finite() || multiplier < 0.0 {
                    return Err(ConfigError::InvalidMultiplier {
                        node: node.id.clone(),
                        value: multiplier,
                    });
                }
                distribution(&generic.processing_time, false)?;
                for time in generic.processing_time_by_type.values() {
                    distribution(time, false)?;
                }
                if let SyncMode::WaitN(wait) = &generic.sync {
                    for connection in wait.required.keys() {
                        let is_input = inputs.iter().any(|&i| self.connections[i].id == *connection);
                        if !is_input {
                            return Err(ConfigError::UnknownRequiredInput {
                                node: node.id.clone(),
                                connection: connection.clone(),
                            });
                        }
                    }
                }
                for combination in &generic.combinations {
                    let invalid = |reason| ConfigError::InvalidCombination {
                        node: node.id.clone(),
                        combination: combination.id.clone(),
                        reason,
                    };
                    if combination.ingredients.is_empty() {
                        return Err(invalid("it has no ingredient"));
                    }
                    if combination.ingredients.iter().any(|i| i.quantity == 0) {
                        return Err(invalid("an ingredient has a zero quantity"));
                    }
                    if combination.output_quantity == 0 {
                        return Err(invalid("it produces nothing"));
                    }
                }
            }
        }

        Ok(())
    }

    fn check_operator(&self, operator: &Operator) -> Result<(), ConfigError> {
        if operator.assigned_machines.is_empty() {
            return Err(ConfigError::NoAssignedMachines {
                operator: operator.id.clone(),
            });
        }
        for machine in &operator.assigned_machines {
            match self.node(machine) {
                None => {
                    return Err(ConfigError::UnknownNode {
                        referrer: operator.id.clone(),
                        node: machine.clone(),
                    })
                }
                Some(Node {
                    kind: NodeKind::Generic(_),
                    ..
                }) => {}
                Some(_) => {
                    return Err(ConfigError::NotAMachine {
                        operator: operator.id.clone(),
                        node: machine.clone(),
                    })
                }
            }
        }
        let times = operator
            .routes
            .iter()
            .map(|r| &r.time)
            .chain(std::iter::once(&operator.default_travel));
        for time in times {
            time.check()
                .map_err(|reason| ConfigError::InvalidDistribution {
                    owner: operator.id.clone(),
                    reason,
                })?;
        }

        Ok(())
    }
}
