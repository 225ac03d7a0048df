//! Trigger registry for invoking controls by id
//!
//! Lets a context without a handle to the control (a global hotkey
//! handler, a remote command) fire its action by logical id. The registry is
//! an explicitly constructed object, usually shared behind an `Arc`; it
//! starts empty and entries are removed one by one as controls unmount.
//!
//! Registering an id that is already present replaces the old callback.
//! Two controls mounted under the same id therefore resolve last-write-wins:
//! the newest mount receives every invocation until it unmounts.

use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Zero-argument invocation callback
pub type TriggerFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Identifies one registration so a stale unmount cannot remove a newer one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Registration {
    id: RegistrationId,
    callback: TriggerFn,
}

/// Id-keyed table of trigger callbacks
pub struct TriggerRegistry<K = String> {
    entries: Mutex<IndexMap<K, Registration>>,
    next_registration: AtomicU64,
}

impl<K> Default for TriggerRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            next_registration: AtomicU64::new(1),
        }
    }
}

impl<K> TriggerRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `id`, replacing any existing registration
    pub fn register<F>(&self, id: K, callback: F) -> RegistrationId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register_fn(id, Arc::new(callback))
    }

    /// Register an already shared callback under `id`
    pub fn register_fn(&self, id: K, callback: TriggerFn) -> RegistrationId {
        let registration = RegistrationId(self.next_registration.fetch_add(1, Ordering::Relaxed));
        let replaced = self.lock().insert(
            id.clone(),
            Registration {
                id: registration,
                callback,
            },
        );

        if replaced.is_some() {
            info!("Trigger {:?} re-registered, previous callback replaced", id);
        } else {
            debug!("Registered trigger {:?}", id);
        }
        registration
    }

    /// Remove the registration for `id`, returning whether one existed
    pub fn unregister(&self, id: &K) -> bool {
        let removed = self.lock().shift_remove(id).is_some();
        if removed {
            debug!("Unregistered trigger {:?}", id);
        }
        removed
    }

    /// Remove `id` only if `registration` is still the live entry for it
    ///
    /// Used on unmount so that a control replaced by a newer mount under the
    /// same id leaves the newer registration alone.
    pub fn unregister_registration(&self, id: &K, registration: RegistrationId) -> bool {
        let mut entries = self.lock();
        match entries.get(id) {
            Some(entry) if entry.id == registration => {
                entries.shift_remove(id);
                debug!("Unregistered trigger {:?}", id);
                true
            }
            _ => false,
        }
    }

    /// Call the callback registered under `id`
    ///
    /// Unknown ids are a no-op. Returns whether a callback ran. The callback
    /// runs after the registry lock is released, so it may itself register,
    /// unregister, or invoke other ids.
    pub fn invoke(&self, id: &K) -> bool {
        let callback = self.lock().get(id).map(|entry| entry.callback.clone());
        match callback {
            Some(callback) => {
                debug!("Invoking trigger {:?}", id);
                callback();
                true
            }
            None => {
                debug!("No trigger registered for {:?}", id);
                false
            }
        }
    }

    /// Check if an id is registered
    pub fn contains(&self, id: &K) -> bool {
        self.lock().contains_key(id)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    /// Number of registered ids
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<K, Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration held by a mounted control
///
/// Dropping the guard unmounts the control: its registration is removed
/// unless a newer mount has since replaced it.
#[must_use = "dropping the mount unregisters the trigger immediately"]
pub struct Mount<K>
where
    K: Eq + Hash + Clone + Debug,
{
    id: K,
    registration: RegistrationId,
    registry: Arc<TriggerRegistry<K>>,
}

impl<K> Mount<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Register `callback` under `id` for the lifetime of the returned guard
    pub fn new(registry: &Arc<TriggerRegistry<K>>, id: K, callback: TriggerFn) -> Self {
        let registration = registry.register_fn(id.clone(), callback);
        Self {
            id,
            registration,
            registry: registry.clone(),
        }
    }

    /// The id this control is mounted under
    pub fn id(&self) -> &K {
        &self.id
    }

    /// Check if this mount still owns its id
    pub fn is_live(&self) -> bool {
        self.registry
            .lock()
            .get(&self.id)
            .is_some_and(|entry| entry.id == self.registration)
    }

    /// Unmount explicitly
    pub fn unmount(self) {
        drop(self);
    }
}

impl<K> Drop for Mount<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        self.registry
            .unregister_registration(&self.id, self.registration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = count.clone();
        (count, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_register_and_invoke() {
        let registry = TriggerRegistry::new();
        let (count, callback) = counter();

        registry.register("save".to_string(), callback);
        assert!(registry.invoke(&"save".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_unknown_is_noop() {
        let registry: TriggerRegistry<&str> = TriggerRegistry::new();
        assert!(!registry.invoke(&"missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister() {
        let registry = TriggerRegistry::new();
        let (count, callback) = counter();

        registry.register("x", callback);
        assert!(registry.unregister(&"x"));
        assert!(!registry.unregister(&"x"));
        assert!(!registry.invoke(&"x"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reregister_replaces_callback() {
        let registry = TriggerRegistry::new();
        let (old_count, old_callback) = counter();
        let (new_count, new_callback) = counter();

        registry.register("x", old_callback);
        registry.register("x", new_callback);
        registry.invoke(&"x");
        registry.invoke(&"x");

        assert_eq!(old_count.load(Ordering::SeqCst), 0);
        assert_eq!(new_count.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_keep_registration_order() {
        let registry = TriggerRegistry::new();
        registry.register(3u32, || {});
        registry.register(1u32, || {});
        registry.register(2u32, || {});
        registry.unregister(&1);

        assert_eq!(registry.ids(), vec![3, 2]);
        assert!(registry.contains(&2));
    }

    #[test]
    fn test_stale_mount_leaves_newer_registration() {
        let registry = Arc::new(TriggerRegistry::new());
        let (old_count, old_callback) = counter();
        let (new_count, new_callback) = counter();

        let first = Mount::new(&registry, "x", Arc::new(old_callback));
        let second = Mount::new(&registry, "x", Arc::new(new_callback));
        assert!(!first.is_live());
        assert!(second.is_live());

        first.unmount();
        assert!(registry.invoke(&"x"));
        assert_eq!(old_count.load(Ordering::SeqCst), 0);
        assert_eq!(new_count.load(Ordering::SeqCst), 1);

        drop(second);
        assert!(!registry.contains(&"x"));
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        let registry = Arc::new(TriggerRegistry::new());
        let (count, callback) = counter();
        registry.register("inner", callback);

        let weak = Arc::downgrade(&registry);
        registry.register("outer", move || {
            if let Some(registry) = weak.upgrade() {
                registry.invoke(&"inner");
            }
        });

        assert!(registry.invoke(&"outer"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
