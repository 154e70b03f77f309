//! Event Bus
//!
//! 事件名 -> 有序回调列表。触发时先复制回调快照再调用，回调内部可以
//! 继续注册新的回调。

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

pub struct EventBus<F: ?Sized> {
    listeners: DashMap<String, Vec<Arc<F>>>,
}

impl<F: ?Sized> EventBus<F> {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    /// 追加回调
    pub fn on(&self, event: impl Into<String>, listener: Arc<F>) {
        self.listeners.entry(event.into()).or_default().push(listener);
    }

    /// 事件的回调快照（注册顺序）
    pub fn listeners(&self, event: &str) -> Vec<Arc<F>> {
        self.listeners
            .get(event)
            .map(|listeners| listeners.value().clone())
            .unwrap_or_default()
    }

    pub fn has(&self, event: &str) -> bool {
        self.listeners
            .get(event)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .listeners
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

impl<F: ?Sized> Default for EventBus<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for EventBus<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.event_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Listener = dyn Fn(&mut Vec<u8>) + Send + Sync;

    #[test]
    fn test_listeners_keep_registration_order() {
        let bus: EventBus<Listener> = EventBus::new();
        bus.on("tick", Arc::new(|out: &mut Vec<u8>| out.push(1)));
        bus.on("tick", Arc::new(|out: &mut Vec<u8>| out.push(2)));

        let mut out = Vec::new();
        for listener in bus.listeners("tick") {
            listener(&mut out);
        }

        assert_eq!(out, vec![1, 2]);
        assert!(bus.listeners("missing").is_empty());
        assert!(!bus.has("missing"));
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let bus: Arc<EventBus<dyn Fn() + Send + Sync>> = Arc::new(EventBus::new());
        let calls = Arc::new(Mutex::new(0));

        let inner_bus = bus.clone();
        let counter = calls.clone();
        bus.on(
            "grow",
            Arc::new(move || {
                *counter.lock().unwrap() += 1;
                inner_bus.on("grown", Arc::new(|| {}));
            }),
        );

        for listener in bus.listeners("grow") {
            listener();
        }

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(bus.has("grown"));
    }

    #[test]
    fn test_concurrent_registration() {
        let bus: Arc<EventBus<dyn Fn() + Send + Sync>> = Arc::new(EventBus::new());

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        bus.on("shared", Arc::new(|| {}));
                        bus.on(format!("own-{worker}"), Arc::new(|| {}));
                        let _ = bus.listeners("shared");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(bus.listeners("shared").len(), 400);
        assert_eq!(bus.listeners("own-3").len(), 50);
        assert_eq!(bus.event_names().len(), 9);
    }
}
