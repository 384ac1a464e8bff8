// ABOUTME: Component hub module: typed service registry, dependency binding and pub/sub topics
// Providers register under contracts, consumers declare dependencies and subscribe to topics

pub mod broker;
pub mod dependency;
pub mod topic;

pub use broker::{Hub, Message};
pub use dependency::{
    Cardinality, ComponentId, Contract, Dependency, Optionality, Properties, RegistrationId,
    ServiceReference,
};
pub use topic::{RootPath, Topic};
