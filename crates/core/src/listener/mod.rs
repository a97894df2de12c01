/// Observer notified when a render session finishes.
pub trait CompletionListener: Send {
    /// Called once, synchronously, from the step that exhausted the source.
    fn on_complete(&mut self);
}

impl<F: FnMut() + Send> CompletionListener for F {
    fn on_complete(&mut self) {
        self()
    }
}

/// Handle returned by [`ListenerSet::add`], used to unregister a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered completion listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<(ListenerId, Box<dyn CompletionListener>)>,
    next_id: u64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: impl CompletionListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregisters `id`. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify_complete(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener.on_complete();
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
