use rand::distributions::{Distribution as _, WeightedIndex};
use rand::Rng;

/// An item type produced by a source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemType {
    /// Type identifier, used as the key of per-type bookkeeping.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display color, for the renderer.
    pub color: Option<String>,
}

impl ItemType {
    /// Creates an item type whose name is its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            color: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// How a source picks the type of each item it generates.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypePolicy {
    /// Items carry no type.
    #[default]
    Untyped,
    /// Every item has the same type.
    Single(String),
    /// Types follow a fixed sequence, optionally repeated forever.
    Sequence {
        /// The sequence of type identifiers.
        types: Vec<String>,
        /// Whether the sequence restarts once exhausted.
        looping: bool,
    },
    /// A finite stock of each type, drawn without replacement.
    RandomFinite(Vec<(String, usize)>),
    /// An endless draw with the given relative weights.
    RandomInfinite(Vec<(String, f64)>),
}

impl TypePolicy {
    pub(crate) fn check(&self) -> Result<(), &'static str> {
        match self {
            Self::Untyped | Self::Single(_) => Ok(()),
            Self::Sequence { types, .. } => {
                if types.is_empty() {
                    Err("the sequence is empty")
                } else {
                    Ok(())
                }
            }
            Self::RandomFinite(counts) => {
                if counts.iter().all(|(_, count)| *count == 0) {
                    Err("the stock is empty")
                } else {
                    Ok(())
                }
            }
            Self::RandomInfinite(weights) => {
                if weights.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
                    return Err("weights must be finite and non-negative");
                }
                if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
                    return Err("at least one weight must be positive");
                }
                Ok(())
            }
        }
    }
}

/// Outcome of a type draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Draw {
    /// The next item has this type.
    Item(Option<String>),
    /// The policy cannot produce any more item.
    Exhausted,
}

/// Stateful type generator of a source, rewound at the start of every run.
#[derive(Clone, Debug)]
pub(crate) struct TypeGenerator {
    policy: TypePolicy,
    position: usize,
    remaining: Vec<usize>,
}

impl TypeGenerator {
    pub(crate) fn new(policy: TypePolicy) -> Self {
        let mut generator = Self {
            policy,
            position: 0,
            remaining: Vec::new(),
        };
        generator.reset();

        generator
    }

    /// Restores the sequence position and the finite stocks.
    pub(crate) fn reset(&mut self) {
        self.position = 0;
        self.remaining = match &self.policy {
            TypePolicy::RandomFinite(counts) => counts.iter().map(|(_, count)| *count).collect(),
            _ => Vec::new(),
        };
    }

    pub(crate) fn draw(&mut self) -> Draw {
        self.draw_with(&mut rand::thread_rng())
    }

    pub(crate) fn draw_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Draw {
        match &self.policy {
            TypePolicy::Untyped => Draw::Item(None),
            TypePolicy::Single(id) => Draw::Item(Some(id.clone())),
            TypePolicy::Sequence { types, looping } => {
                if self.position >= types.len() {
                    if !*looping || types.is_empty() {
                        return Draw::Exhausted;
                    }
                    self.position = 0;
                }
                let id = types[self.position].clone();
                self.position += 1;

                Draw::Item(Some(id))
            }
            TypePolicy::RandomFinite(counts) => {
                let total: usize = self.remaining.iter().sum();
                if total == 0 {
                    return Draw::Exhausted;
                }
                // Each remaining unit is equally likely, which weights types by
                // their remaining stock.
                let mut pick = rng.gen_range(0..total);
                for (idx, left) in self.remaining.iter_mut().enumerate() {
                    if pick < *left {
                        *left -= 1;
                        return Draw::Item(Some(counts[idx].0.clone()));
                    }
                    pick -= *left;
                }

                Draw::Exhausted
            }
            TypePolicy::RandomInfinite(weights) => {
                match WeightedIndex::new(weights.iter().map(|(_, w)| *w)) {
                    Ok(index) => Draw::Item(Some(weights[index.sample(rng)].0.clone())),
                    Err(_) => Draw::Exhausted,
                }
            }
        }
    }
}
