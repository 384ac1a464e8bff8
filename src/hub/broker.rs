// ABOUTME: In-process component hub: service registry, dependency binding and topic dispatch
// Callbacks always run outside the registry lock so they may call back into the hub

use super::dependency::{
    Cardinality, ComponentId, Contract, Dependency, Properties, RegistrationId, ServiceReference,
};
use super::topic::Topic;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Payload delivered to topic subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub data: String,
}

impl Message {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

type Handler = Arc<dyn Fn(&Message) + Send + Sync>;
type BindingCallback = Arc<dyn Fn(ErasedReference) + Send + Sync>;

#[derive(Clone)]
struct ErasedReference {
    id: RegistrationId,
    component: ComponentId,
    service: Arc<dyn Any + Send + Sync>,
    properties: Properties,
}

impl ErasedReference {
    fn downcast<C: Contract + ?Sized>(&self) -> Option<ServiceReference<C>> {
        self.service
            .downcast_ref::<Arc<C>>()
            .map(|service| ServiceReference {
                id: self.id,
                component: self.component.clone(),
                service: Arc::clone(service),
                properties: self.properties.clone(),
            })
    }
}

struct Registration {
    id: RegistrationId,
    component: ComponentId,
    contract: TypeId,
    contract_name: &'static str,
    // Holds an Arc<C> for the registered contract C
    service: Arc<dyn Any + Send + Sync>,
    properties: Properties,
}

impl Registration {
    fn reference(&self) -> ErasedReference {
        ErasedReference {
            id: self.id,
            component: self.component.clone(),
            service: Arc::clone(&self.service),
            properties: self.properties.clone(),
        }
    }
}

struct Requirement {
    component: ComponentId,
    contract: TypeId,
    dependency: Dependency,
    bound: Vec<RegistrationId>,
    on_bind: BindingCallback,
    on_unbind: BindingCallback,
}

struct Subscription {
    component: ComponentId,
    topic: Topic,
    handler: Handler,
}

enum Notification {
    Bind(BindingCallback, ErasedReference),
    Unbind(BindingCallback, ErasedReference),
}

impl Notification {
    fn deliver(self) {
        match self {
            Self::Bind(callback, reference) | Self::Unbind(callback, reference) => {
                callback(reference);
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    last_id: u64,
    registrations: Vec<Registration>,
    requirements: Vec<Requirement>,
    subscriptions: Vec<Subscription>,
}

impl Registry {
    /// Removes a registration, unbinding it from every consumer and rebinding
    /// single dependencies to the most recent remaining provider.
    fn withdraw(&mut self, id: RegistrationId, notifications: &mut Vec<Notification>) -> bool {
        let Some(position) = self.registrations.iter().position(|r| r.id == id) else {
            return false;
        };
        let registration = self.registrations.remove(position);
        let reference = registration.reference();
        let replacement = self
            .registrations
            .iter()
            .rev()
            .find(|r| r.contract == registration.contract)
            .map(Registration::reference);

        for requirement in self
            .requirements
            .iter_mut()
            .filter(|r| r.contract == registration.contract)
        {
            let Some(index) = requirement.bound.iter().position(|bound| *bound == id) else {
                continue;
            };
            requirement.bound.remove(index);
            notifications.push(Notification::Unbind(
                Arc::clone(&requirement.on_unbind),
                reference.clone(),
            ));

            if requirement.dependency.cardinality == Cardinality::Single
                && requirement.bound.is_empty()
            {
                if let Some(next) = &replacement {
                    requirement.bound.push(next.id);
                    notifications.push(Notification::Bind(
                        Arc::clone(&requirement.on_bind),
                        next.clone(),
                    ));
                }
            }
        }

        info!(
            "Withdrew {} provided by {}",
            registration.contract_name, registration.component
        );
        true
    }
}

/// Process-wide registry and pub/sub router shared by providers and consumers
#[derive(Clone, Default)]
pub struct Hub {
    registry: Arc<Mutex<Registry>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `service` under contract `C` and binds it to waiting consumers
    pub fn provide_service<C: Contract + ?Sized>(
        &self,
        component: &ComponentId,
        service: Arc<C>,
        properties: Properties,
    ) -> RegistrationId {
        let mut notifications = Vec::new();
        let id = {
            let mut guard = self.registry();
            let registry = &mut *guard;
            registry.last_id += 1;
            let registration = Registration {
                id: RegistrationId(registry.last_id),
                component: component.clone(),
                contract: TypeId::of::<C>(),
                contract_name: C::NAME,
                service: Arc::new(service),
                properties,
            };

            let reference = registration.reference();
            for requirement in registry
                .requirements
                .iter_mut()
                .filter(|r| r.contract == registration.contract)
            {
                if requirement.dependency.cardinality == Cardinality::Aggregate
                    || requirement.bound.is_empty()
                {
                    requirement.bound.push(registration.id);
                    notifications.push(Notification::Bind(
                        Arc::clone(&requirement.on_bind),
                        reference.clone(),
                    ));
                }
            }

            let id = registration.id;
            registry.registrations.push(registration);
            id
        };

        info!("{} provides {} ({:?})", component, C::NAME, id);
        notifications.into_iter().for_each(Notification::deliver);
        id
    }

    /// Removes a single registration; returns false when it was already gone
    pub fn withdraw_service(&self, id: RegistrationId) -> bool {
        let mut notifications = Vec::new();
        let withdrawn = self.registry().withdraw(id, &mut notifications);
        notifications.into_iter().for_each(Notification::deliver);
        withdrawn
    }

    /// Declares a dependency of `component` on contract `C`.
    ///
    /// `on_bind` runs immediately for the providers already registered, then
    /// `on_bind`/`on_unbind` track registrations until the component unregisters.
    pub fn require_service<C, B, U>(
        &self,
        component: &ComponentId,
        dependency: Dependency,
        on_bind: B,
        on_unbind: U,
    ) where
        C: Contract + ?Sized,
        B: Fn(ServiceReference<C>) + Send + Sync + 'static,
        U: Fn(ServiceReference<C>) + Send + Sync + 'static,
    {
        let on_bind = erase::<C, _>(on_bind);
        let on_unbind = erase::<C, _>(on_unbind);
        let contract = TypeId::of::<C>();

        let notifications: Vec<Notification> = {
            let mut guard = self.registry();
            let registry = &mut *guard;
            let mut matching: Vec<ErasedReference> = registry
                .registrations
                .iter()
                .filter(|r| r.contract == contract)
                .map(Registration::reference)
                .collect();
            if dependency.cardinality == Cardinality::Single {
                matching = matching.pop().into_iter().collect();
            }

            registry.requirements.push(Requirement {
                component: component.clone(),
                contract,
                dependency,
                bound: matching.iter().map(|r| r.id).collect(),
                on_bind: Arc::clone(&on_bind),
                on_unbind,
            });

            matching
                .into_iter()
                .map(|reference| Notification::Bind(Arc::clone(&on_bind), reference))
                .collect()
        };

        debug!(
            "{} requires {} ({:?}), {} already available",
            component,
            C::NAME,
            dependency,
            notifications.len()
        );
        notifications.into_iter().for_each(Notification::deliver);
    }

    /// Most recent provider registered under `C`
    pub fn get_service<C: Contract + ?Sized>(&self) -> Option<ServiceReference<C>> {
        let contract = TypeId::of::<C>();
        self.registry()
            .registrations
            .iter()
            .rev()
            .find(|r| r.contract == contract)
            .and_then(|r| r.reference().downcast::<C>())
    }

    /// Every provider registered under `C`, in registration order
    pub fn get_services<C: Contract + ?Sized>(&self) -> Vec<ServiceReference<C>> {
        let contract = TypeId::of::<C>();
        self.registry()
            .registrations
            .iter()
            .filter(|r| r.contract == contract)
            .filter_map(|r| r.reference().downcast::<C>())
            .collect()
    }

    pub fn subscribe<H>(&self, component: &ComponentId, topic: &Topic, handler: H)
    where
        H: Fn(&Message) + Send + Sync + 'static,
    {
        self.registry().subscriptions.push(Subscription {
            component: component.clone(),
            topic: topic.clone(),
            handler: Arc::new(handler),
        });
        debug!("{} subscribed to {}", component, topic);
    }

    pub fn unsubscribe(&self, component: &ComponentId, topic: &Topic) {
        self.registry()
            .subscriptions
            .retain(|s| !(s.component == *component && s.topic == *topic));
        debug!("{} unsubscribed from {}", component, topic);
    }

    /// Delivers `message` to every subscriber of `topic` in subscription order.
    ///
    /// A panicking handler is logged and skipped. Returns the number of
    /// handlers that completed.
    pub fn publish(&self, publisher: &ComponentId, topic: &Topic, message: Message) -> usize {
        let handlers: Vec<Handler> = self
            .registry()
            .subscriptions
            .iter()
            .filter(|s| s.topic == *topic)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        debug!(
            "{} publishes on {} to {} subscriber(s)",
            publisher,
            topic,
            handlers.len()
        );

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&message))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    "A subscriber of {} failed while handling a message from {}",
                    topic, publisher
                ),
            }
        }
        delivered
    }

    /// Tears down everything `component` registered: its requirements and
    /// subscriptions are dropped silently, its provided services are withdrawn.
    pub fn unregister(&self, component: &ComponentId) {
        let mut notifications = Vec::new();
        {
            let mut guard = self.registry();
            let registry = &mut *guard;
            registry.requirements.retain(|r| r.component != *component);
            registry.subscriptions.retain(|s| s.component != *component);

            let owned: Vec<RegistrationId> = registry
                .registrations
                .iter()
                .filter(|r| r.component == *component)
                .map(|r| r.id)
                .collect();
            for id in owned {
                registry.withdraw(id, &mut notifications);
            }
        }

        info!("{} unregistered from the hub", component);
        notifications.into_iter().for_each(Notification::deliver);
    }
}

fn erase<C, F>(callback: F) -> BindingCallback
where
    C: Contract + ?Sized,
    F: Fn(ServiceReference<C>) + Send + Sync + 'static,
{
    Arc::new(move |erased: ErasedReference| {
        if let Some(reference) = erased.downcast::<C>() {
            callback(reference);
        }
    })
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        f.debug_struct("Hub")
            .field("registrations", &registry.registrations.len())
            .field("requirements", &registry.requirements.len())
            .field("subscriptions", &registry.subscriptions.len())
            .finish()
    }
}
