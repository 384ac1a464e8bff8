// ABOUTME: Capability contracts, dependency declarations and service references
// A contract is a trait object type; registrations are keyed by its TypeId

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Metadata attached to a registration, visible to consumers looking the provider up
pub type Properties = BTreeMap<String, Value>;

/// Marks a trait object type as something providers can be registered under
pub trait Contract: Send + Sync + 'static {
    const NAME: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Bound to at most one provider at a time
    Single,
    /// Bound to every matching provider
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optionality {
    Required,
    Optional,
}

/// How a consumer depends on a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub cardinality: Cardinality,
    pub optionality: Optionality,
}

impl Dependency {
    pub const fn required() -> Self {
        Self {
            cardinality: Cardinality::Single,
            optionality: Optionality::Required,
        }
    }

    pub const fn optional() -> Self {
        Self {
            cardinality: Cardinality::Single,
            optionality: Optionality::Optional,
        }
    }

    #[must_use]
    pub const fn aggregate(mut self) -> Self {
        self.cardinality = Cardinality::Aggregate;
        self
    }

    pub fn is_required(&self) -> bool {
        self.optionality == Optionality::Required
    }
}

/// Identifies the component that owns registrations, requirements and subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub(crate) u64);

/// A provider handed to a consumer on bind/unbind or lookup
pub struct ServiceReference<C: ?Sized> {
    pub id: RegistrationId,
    pub component: ComponentId,
    pub service: Arc<C>,
    pub properties: Properties,
}

impl<C: ?Sized> Clone for ServiceReference<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            component: self.component.clone(),
            service: Arc::clone(&self.service),
            properties: self.properties.clone(),
        }
    }
}

impl<C: Contract + ?Sized> fmt::Debug for ServiceReference<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("contract", &C::NAME)
            .field("id", &self.id)
            .field("component", &self.component)
            .field("properties", &self.properties)
            .finish()
    }
}
