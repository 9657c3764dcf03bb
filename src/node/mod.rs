//! Node facade.
//!
//! - [`HarnessNode`] drives one daemon through launch → bring-up → watch → stop.
//! - [`NodeBuilder`] wires the bus, subscribers and dialer.
//! - [`NodeIds`] numbers nodes; [`TaskGroup`] joins a generation's background tasks.

mod builder;
mod controller;
mod ids;
mod tasks;

pub use builder::NodeBuilder;
pub use controller::HarnessNode;
pub use ids::{NodeId, NodeIds};
pub use tasks::TaskGroup;
