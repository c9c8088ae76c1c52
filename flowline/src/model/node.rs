use std::collections::BTreeMap;

use super::{Combination, Distribution, ItemType, TypePolicy};

/// A station of the flow graph.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role and role-specific attributes.
    pub kind: NodeKind,
}

/// The role of a node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Generates items.
    Source(SourceConfig),
    /// Counts and discards items.
    Sink,
    /// Routes each item to exactly one of its outputs.
    Splitter(SplitMode),
    /// Forwards the first item available on any of its inputs.
    Merger,
    /// Processes items, possibly with an operator.
    Generic(GenericConfig),
}

impl NodeKind {
    /// Short lowercase label of the role.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Sink => "sink",
            Self::Splitter(_) => "splitter",
            Self::Merger => "merger",
            Self::Generic(_) => "generic",
        }
    }
}

/// Attributes of a source node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceConfig {
    /// Time between two batches.
    pub interval: Distribution,
    /// Number of items generated at each tick.
    pub batch_size: usize,
    /// Total number of items to generate; 0 means unlimited.
    pub limit: usize,
    /// Item types this source may generate.
    pub item_types: Vec<ItemType>,
    /// How the type of each item is picked.
    pub type_policy: TypePolicy,
}

impl SourceConfig {
    /// Creates an unlimited single-item-batch source.
    pub fn new(interval: Distribution) -> Self {
        Self {
            interval,
            batch_size: 1,
            limit: 0,
            item_types: Vec::new(),
            type_policy: TypePolicy::Untyped,
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the generation limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Generates items of a single type.
    pub fn with_single_type(mut self, item_type: ItemType) -> Self {
        self.type_policy = TypePolicy::Single(item_type.id.clone());
        self.item_types = vec![item_type];
        self
    }

    /// Sets the item types and the policy used to pick among them.
    pub fn with_types(mut self, item_types: Vec<ItemType>, type_policy: TypePolicy) -> Self {
        self.item_types = item_types;
        self.type_policy = type_policy;
        self
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new(Distribution::Constant(1.0))
    }
}

/// Output selection policy of a splitter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitMode {
    /// Outputs are used in turn, in declaration order.
    #[default]
    RoundRobin,
    /// The first output in declaration order that passes the check, or the
    /// first output if none does.
    FirstAvailable(AvailabilityCheck),
    /// An output picked uniformly at random.
    Random,
}

/// How a splitter decides whether an output is available.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AvailabilityCheck {
    /// The output buffer is below capacity.
    #[default]
    ByBuffer,
    /// The downstream node is inactive.
    ByNodeState,
}

/// Attributes of a generic processing node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericConfig {
    /// Default processing time.
    pub processing_time: Distribution,
    /// Processing time by type of the first collected item.
    pub processing_time_by_type: BTreeMap<String, Distribution>,
    /// Output type by input type, in standard mode.
    pub output_type_by_type: BTreeMap<String, String>,
    /// Number of output units per cycle; the fractional part is a
    /// probability.
    pub output_multiplier: f64,
    /// Number of items processed at once.
    pub capacity: usize,
    /// How items are collected from the inputs.
    pub sync: SyncMode,
    /// Recipes, used in wait-N mode.
    pub combinations: Vec<Combination>,
}

impl GenericConfig {
    /// Creates a first-available node with the specified processing time.
    pub fn new(processing_time: Distribution) -> Self {
        Self {
            processing_time,
            processing_time_by_type: BTreeMap::new(),
            output_type_by_type: BTreeMap::new(),
            output_multiplier: 1.0,
            capacity: 1,
            sync: SyncMode::default(),
            combinations: Vec::new(),
        }
    }

    /// Sets the output multiplier.
    pub fn with_multiplier(mut self, output_multiplier: f64) -> Self {
        self.output_multiplier = output_multiplier;
        self
    }

    /// Sets the synchronization mode.
    pub fn with_sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    /// Switches to wait-N mode and matches inputs against recipes.
    pub fn with_combinations(mut self, combinations: Vec<Combination>) -> Self {
        if !matches!(self.sync, SyncMode::WaitN(_)) {
            self.sync = SyncMode::WaitN(WaitN::default());
        }
        self.combinations = combinations;
        self
    }

    /// Whether inputs are matched against recipes.
    pub fn uses_combinations(&self) -> bool {
        matches!(self.sync, SyncMode::WaitN(_)) && !self.combinations.is_empty()
    }
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self::new(Distribution::Constant(1.0))
    }
}

/// How a generic node collects its inputs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyncMode {
    /// One item from whichever input has one.
    FirstAvailable(TieBreak),
    /// A fixed number of items from every input, or a recipe match.
    WaitN(WaitN),
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::FirstAvailable(TieBreak::Order)
    }
}

/// Tie-break among inputs that are ready at the same instant.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TieBreak {
    /// Lowest declared input wins.
    #[default]
    Order,
    /// Uniform pick among ready inputs.
    Random,
    /// Inputs are awaited one at a time, in turn.
    RoundRobin,
}

/// Wait-N-per-branch parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaitN {
    /// Required units by input connection; inputs not listed need 1 unit.
    pub required: BTreeMap<String, usize>,
    /// Units output per cycle when no recipe is used.
    pub output_quantity: usize,
    /// Output type when no recipe is used; inputs pass through if unset.
    pub output_type: Option<String>,
}

impl Default for WaitN {
    fn default() -> Self {
        Self {
            required: BTreeMap::new(),
            output_quantity: 1,
            output_type: None,
        }
    }
}
