pub mod completion;
pub mod equipment;
pub mod subclass;
pub mod switch;

pub use completion::CompletionValidator;
pub use equipment::{EquipmentExpectation, EquipmentValidator};
pub use subclass::SubclassValidator;
pub use switch::SwitchValidator;
