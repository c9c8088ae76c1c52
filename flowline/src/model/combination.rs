/// A recipe turning a set of typed ingredients into typed outputs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Combination {
    /// Identifier, unique within its node.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Required inputs.
    pub ingredients: Vec<Ingredient>,
    /// Type of the produced items.
    pub output_type: String,
    /// Number of produced items.
    pub output_quantity: usize,
}

impl Combination {
    /// Creates a recipe producing `output_quantity` items of `output_type`.
    pub fn new(
        id: impl Into<String>,
        ingredients: Vec<Ingredient>,
        output_type: impl Into<String>,
        output_quantity: usize,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ingredients,
            output_type: output_type.into(),
            output_quantity,
        }
    }

    /// Total required quantity of a type, summed over duplicate ingredients.
    pub fn required(&self, type_id: &str) -> usize {
        self.ingredients
            .iter()
            .filter(|i| i.type_id == type_id)
            .map(|i| i.quantity)
            .sum()
    }
}

/// A required quantity of one item type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ingredient {
    /// Item type identifier.
    pub type_id: String,
    /// Required number of items.
    pub quantity: usize,
}

impl Ingredient {
    /// Creates an ingredient.
    pub fn new(type_id: impl Into<String>, quantity: usize) -> Self {
        Self {
            type_id: type_id.into(),
            quantity,
        }
    }
}
