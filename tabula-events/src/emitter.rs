//! Publish/subscribe emitter keyed by event kind.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Identifier of a registered listener.
pub type ListenerId = u64;

/// An event that can be dispatched by an [`EventEmitter`].
pub trait Event: Send + Sync + 'static {
    /// Discriminator listeners subscribe to.
    type Kind: Copy + Eq + Hash + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listener<E> {
    id: ListenerId,
    once: bool,
    callback: Callback<E>,
}

struct Registry<E: Event> {
    next_id: ListenerId,
    listeners: HashMap<E::Kind, Vec<Listener<E>>>,
}

impl<E: Event> Registry<E> {
    fn remove(&mut self, id: ListenerId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|l| l.id == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }
}

/// Removal half of a registry, erased over the event type so
/// [`Subscription`] handles are uniform.
trait ListenerRemover: Send + Sync {
    fn remove_listener(&self, id: ListenerId) -> bool;
}

impl<E: Event> ListenerRemover for Mutex<Registry<E>> {
    fn remove_listener(&self, id: ListenerId) -> bool {
        self.lock().unwrap_or_else(PoisonError::into_inner).remove(id)
    }
}

/// Mapping from event kind to an ordered list of listeners.
///
/// Listeners run synchronously on the emitting task, in registration order,
/// outside the registry lock, so a listener may subscribe or unsubscribe
/// while it runs. Listeners only observe events; they get no handle to the
/// emitter's owner.
pub struct EventEmitter<E: Event> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: Event> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                listeners: HashMap::new(),
            })),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register<F>(&self, kind: E::Kind, once: bool, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.entry(kind).or_default().push(Listener {
                id,
                once,
                callback: Arc::new(callback),
            });
            id
        };
        let registry: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        let remover: Weak<dyn ListenerRemover> = registry;
        Subscription { id, remover }
    }

    /// Register a listener for every event of `kind`.
    pub fn on<F>(&self, kind: E::Kind, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, false, callback)
    }

    /// Register a listener for the next event of `kind` only.
    pub fn once<F>(&self, kind: E::Kind, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, true, callback)
    }

    /// Remove a listener. Returns false when it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        self.registry().remove(id)
    }

    /// Dispatch an event. Returns how many listeners ran.
    pub fn emit(&self, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = {
            let mut registry = self.registry();
            match registry.listeners.get_mut(&event.kind()) {
                Some(listeners) => {
                    let callbacks = listeners.iter().map(|l| Arc::clone(&l.callback)).collect();
                    listeners.retain(|l| !l.once);
                    callbacks
                }
                None => Vec::new(),
            }
        };
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.registry()
            .listeners
            .get(&kind)
            .map_or(0, |listeners| listeners.len())
    }

    pub fn clear(&self) {
        self.registry().listeners.clear();
    }
}

impl<E: Event> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Event> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry();
        let count: usize = registry.listeners.values().map(Vec::len).sum();
        f.debug_struct("EventEmitter")
            .field("listeners", &count)
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle keeps the listener registered; call [`remove`] or
/// [`stop`] to detach it. Removal is idempotent and safe after the emitter
/// is gone.
///
/// [`remove`]: Subscription::remove
/// [`stop`]: Subscription::stop
#[derive(Clone)]
pub struct Subscription {
    id: ListenerId,
    remover: Weak<dyn ListenerRemover>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Detach the listener. Returns false when it was already detached.
    pub fn remove(&self) -> bool {
        match self.remover.upgrade() {
            Some(registry) => registry.remove_listener(self.id),
            None => false,
        }
    }

    /// Alias for [`Subscription::remove`].
    pub fn stop(&self) -> bool {
        self.remove()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
