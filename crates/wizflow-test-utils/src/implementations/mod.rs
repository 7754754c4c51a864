//! Test implementations (fakes) of the subject system.
//!
//! The in-memory subject is a higher-fidelity stand-in than a mock: it keeps real
//! character state, applies the wizard's cascade rules and can be told to
//! misbehave through a [`FaultSet`](crate::faults::FaultSet).

mod character_sheet;
pub mod in_memory_subject;

pub use character_sheet::Rejection;
pub use in_memory_subject::*;
