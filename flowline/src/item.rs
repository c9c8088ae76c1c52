//! Items flowing through the graph.

/// Type key under which untyped items are counted.
pub const DEFAULT_TYPE: &str = "default";

/// A discrete unit flowing between nodes.
///
/// Items are never mutated once they have been put in a buffer:
/// transformations build new items that keep track of their parent.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    /// Unique identifier within a run.
    pub id: String,
    /// Simulation time at which the item was created.
    pub created_at: f64,
    /// Item type identifier, if typed.
    pub item_type: Option<String>,
    /// Display name of the item type.
    pub item_type_name: Option<String>,
    /// Number of logical units represented by this item.
    pub quantity: usize,
    /// Identifier of the item this one was derived from.
    pub parent_id: Option<String>,
}

impl Item {
    /// Creates an untyped single-unit item.
    pub fn new(id: impl Into<String>, created_at: f64) -> Self {
        Self {
            id: id.into(),
            created_at,
            item_type: None,
            item_type_name: None,
            quantity: 1,
            parent_id: None,
        }
    }

    /// Sets the item type and its display name.
    pub fn with_type(mut self, item_type: Option<String>, item_type_name: Option<String>) -> Self {
        self.item_type = item_type;
        self.item_type_name = item_type_name;
        self
    }

    /// Sets the number of logical units.
    pub fn with_quantity(mut self, quantity: usize) -> Self {
        self.quantity = quantity;
        self
    }

    /// Builds a new item derived from this one, keeping its creation time and
    /// type.
    pub fn derive(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: self.created_at,
            item_type: self.item_type.clone(),
            item_type_name: self.item_type_name.clone(),
            quantity: 1,
            parent_id: Some(self.id.clone()),
        }
    }

    /// Returns the key under which this item is counted in per-type
    /// bookkeeping.
    pub fn type_key(&self) -> &str {
        self.item_type.as_deref().unwrap_or(DEFAULT_TYPE)
    }
}
