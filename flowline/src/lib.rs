//! A discrete-event simulator of production flows.
//!
//! Flowline simulates items travelling through a graph of stations: sources
//! generate typed items, processing machines transform them, possibly
//! according to recipes and with the help of operators that walk between
//! machines, splitters and mergers route them, and sinks count them. Stations
//! are linked by optionally bounded FIFO buffers.
//!
//! Each station runs as a cooperative `async` process on a single-threaded
//! executor driven by a virtual clock. A process runs uninterrupted between
//! two suspension points: timeouts, blocking buffer operations and resource
//! acquisitions. Processes woken at the same simulated instant run in the
//! order they were scheduled.
//!
//! # A practical overview
//!
//! Simulating a production flow involves three activities:
//!
//! 1. describing the flow as a [`FlowModel`](model::FlowModel),
//! 2. attaching optional [`Hooks`] to observe what happens,
//! 3. running the flow, either by stepping a [`Session`] explicitly or by
//!    handing it to a [`Controller`] that paces it on a background thread.
//!
//! ## Describing a flow
//!
//! A model is plain data. Nodes and connections get sequential identifiers
//! (`node_0`, `conn_0`, ...), and all their attributes are public fields or
//! builder methods:
//!
//! ```
//! use flowline::model::{
//!     Combination, Distribution, FlowModel, GenericConfig, Ingredient, ItemType, NodeKind,
//!     SourceConfig,
//! };
//!
//! let mut model = FlowModel::new();
//! let bolts = model.add_node(
//!     "bolts",
//!     NodeKind::Source(
//!         SourceConfig::new(Distribution::Constant(1.0)).with_single_type(ItemType::new("A")),
//!     ),
//! );
//! let plates = model.add_node(
//!     "plates",
//!     NodeKind::Source(
//!         SourceConfig::new(Distribution::Constant(2.0)).with_single_type(ItemType::new("B")),
//!     ),
//! );
//! let press = model.add_node(
//!     "press",
//!     NodeKind::Generic(
//!         GenericConfig::new(Distribution::Normal { mean: 1.5, std_dev: 0.2 }).with_combinations(
//!             vec![Combination::new(
//!                 "assembly",
//!                 vec![Ingredient::new("A", 2), Ingredient::new("B", 1)],
//!                 "C",
//!                 1,
//!             )],
//!         ),
//!     ),
//! );
//! let shipping = model.add_node("shipping", NodeKind::Sink);
//!
//! model.add_connection(&bolts, &press);
//! model.add_connection(&plates, &press);
//! model.add_connection(&press, &shipping);
//! model.add_operator("alice", &[&press]);
//!
//! assert!(model.validate().is_ok());
//! ```
//!
//! ## Running a flow
//!
//! A [`SimInit`] validates the model and builds either a [`Session`], which
//! is stepped on the calling thread and suits analytical runs and tests, or
//! a [`Controller`], which offers the `start`/`pause`/`resume`/`set_speed`/
//! `stop` lifecycle of an interactive application.
//!
//! Both expose the shared [`FlowState`](observe::FlowState): observable
//! snapshots of nodes, buffers and operators, and the collected
//! [statistics](stats::StatsReport).
//!
//! # Feature flags
//!
//! * `serde`: derives `Serialize` and `Deserialize` for the model types and
//!   the run settings, so that a host can persist flows.
//! * `tracing-subscriber`: enables the [`tracing`] module and its simulation
//!   time log timer.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod buffer;
mod combination;
pub mod config;
pub mod controller;
pub mod error;
pub(crate) mod executor;
pub mod hooks;
pub mod item;
pub mod model;
pub mod observe;
mod operator;
mod process;
pub(crate) mod resource;
pub(crate) mod scheduler;
pub mod session;
pub mod stats;
pub mod time;
#[cfg(feature = "tracing-subscriber")]
pub mod tracing;
pub(crate) mod util;

pub use config::{PacingMode, SimConfig};
pub use controller::Controller;
pub use error::{ConfigError, SimulationError};
pub use hooks::Hooks;
pub use session::{Session, SimInit};
