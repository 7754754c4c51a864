//! Domain layer: flows, snapshots, results and the typed subject contract.

pub mod catalog;
pub mod context;
pub mod flow_result;
pub mod flow_step;
pub mod payload;
pub mod randomizer;
pub mod snapshot;
pub mod validation;
