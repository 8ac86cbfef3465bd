use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// A state change observer. It takes no arguments; observers read whatever
/// they need from the device once they are called.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`CallbackSet::register`], used to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(u64);

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// The observers of one device.
///
/// Adding the same callback twice and removing an unknown handle are both no-ops.
#[derive(Default, Clone)]
pub struct CallbackSet(BTreeMap<CallbackId, Callback>);

impl fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Callback) -> CallbackId {
        if let Some((id, _)) = self.0.iter().find(|&(_, cb)| Arc::ptr_eq(cb, &callback)) {
            log::warn!("Callback already registered!");
            return *id;
        }
        let id = CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed));
        self.0.insert(id, callback);
        id
    }

    /// Returns true if the callback was registered.
    pub fn unregister(&mut self, id: CallbackId) -> bool {
        self.0.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Calls every callback right away.
    pub fn publish(&self) {
        for callback in self.0.values() {
            callback();
        }
    }

    /// Copies the callbacks into `pending` so they can be called after
    /// whatever lock guards the device has been released.
    pub fn schedule(&self, pending: &mut Notifications) {
        pending.0.extend(self.0.values().cloned());
    }
}

/// Callbacks collected while device state was being changed.
#[derive(Default)]
#[must_use = "collected callbacks only run when fired"]
pub struct Notifications(Vec<Callback>);

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fire(self) {
        for callback in self.0 {
            callback();
        }
    }
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Notifications({})", self.0.len())
    }
}
