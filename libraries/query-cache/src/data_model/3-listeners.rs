//! # Listeners
//! Callbacks are never run while the state they observe is borrowed. Instead, [`Listeners::notifications`]
//! hands back boxed closures and the caller runs them once it has let go of everything.
//! Many callbacks call straight back into the app (to re-read state), so this matters.

use std::rc::Rc;

use crate::data_model::{DirtyState, ListenerKey};

type Listener<Topic> = Rc<dyn Fn(ListenerKey, Topic)>;

pub struct Listeners<Topic> {
    listeners: slotmap::SlotMap<slotmap::DefaultKey, Listener<Topic>>,
}

impl<Topic> Default for Listeners<Topic> {
    fn default() -> Self {
        Self {
            listeners: Default::default(),
        }
    }
}

impl<Topic: Clone + 'static> Listeners<Topic> {
    pub fn register(&mut self, listener: impl Fn(ListenerKey, Topic) + 'static) -> ListenerKey {
        ListenerKey(self.listeners.insert(Rc::new(listener)))
    }

    pub fn unregister(&mut self, key: ListenerKey) {
        self.listeners.remove(key.0);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notifications(&self, topic: &Topic, dirty_state: &DirtyState) -> Vec<Box<dyn FnOnce()>> {
        let exclude = match dirty_state {
            DirtyState::Clean => return Vec::new(),
            DirtyState::DirtyExcept(key) => Some(*key),
            DirtyState::DirtyAll => None,
        };

        self.listeners
            .iter()
            .map(|(key, listener)| (ListenerKey(key), listener))
            .filter(|(key, _)| exclude != Some(*key))
            .map(|(key, listener)| {
                let listener = listener.clone();
                let topic = topic.clone();
                Box::new(move || listener(key, topic)) as Box<dyn FnOnce()>
            })
            .collect()
    }
}
