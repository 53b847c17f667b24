use std::collections::BTreeMap;

use super::listener::{Listener, ListenerId, RegistrationId};
use super::transport::{CURRENT_VALUE_TOKEN, PollRequest, PollUpdate};

/// Result of applying one update record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered { listeners: usize },
    UnknownKey { key: String },
}

#[derive(Debug)]
struct Entry {
    listener: Listener,
    registration: RegistrationId,
}

/// Last-seen tokens and per-key listeners.
///
/// A key is tracked exactly while it has at least one listener.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    tokens: BTreeMap<String, String>,
    listeners: BTreeMap<String, Vec<Entry>>,
}

impl Registry {
    pub(crate) fn subscribe(
        &mut self,
        key: &str,
        token_hint: Option<&str>,
        listener: Listener,
        registration: RegistrationId,
    ) {
        self.unsubscribe(key, listener.id());

        self.listeners
            .entry(key.to_owned())
            .or_default()
            .push(Entry {
                listener,
                registration,
            });

        // A missing hint, or a hint that disagrees with the shared token,
        // falls back to fetching the current value.
        let token = match (token_hint, self.tokens.get(key)) {
            (Some(hint), Some(current)) if current != hint => CURRENT_VALUE_TOKEN,
            (Some(hint), _) => hint,
            (None, _) => CURRENT_VALUE_TOKEN,
        };
        self.tokens.insert(key.to_owned(), token.to_owned());
    }

    /// Removes a listener. Returns `true` when the key itself was dropped.
    pub(crate) fn unsubscribe(&mut self, key: &str, listener: ListenerId) -> bool {
        self.remove_where(key, |entry| entry.listener.id() == listener)
    }

    /// Removes the entry created by `registration`, if it is still current.
    /// Returns `true` when the key itself was dropped.
    pub(crate) fn release(&mut self, key: &str, registration: RegistrationId) -> bool {
        self.remove_where(key, |entry| entry.registration == registration)
    }

    fn remove_where<F>(&mut self, key: &str, matches: F) -> bool
    where
        F: Fn(&Entry) -> bool,
    {
        let Some(entries) = self.listeners.get_mut(key) else {
            return false;
        };
        entries.retain(|entry| !matches(entry));
        if !entries.is_empty() {
            return false;
        }
        self.listeners.remove(key);
        self.tokens.remove(key);
        true
    }

    pub(crate) fn snapshot(&self) -> PollRequest {
        PollRequest::new(self.tokens.clone())
    }

    pub(crate) fn deliver(&mut self, update: PollUpdate) -> Delivery {
        let PollUpdate { key, value, next } = update;
        let (Some(token), Some(listeners)) = (self.tokens.get_mut(&key), self.listeners.get(&key))
        else {
            return Delivery::UnknownKey { key };
        };
        for entry in listeners {
            entry.listener.notify(&key, &value);
        }
        *token = next;
        Delivery::Delivered {
            listeners: listeners.len(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.tokens.len()
    }

    #[cfg(test)]
    pub(crate) fn token(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use super::*;

    type Calls = Arc<Mutex<Vec<(&'static str, String, Value)>>>;

    fn recording(label: &'static str, calls: &Calls) -> Listener {
        let calls = Arc::clone(calls);
        Listener::new(move |key, value| {
            if let Ok(mut guard) = calls.lock() {
                guard.push((label, key.to_owned(), value.clone()));
            }
        })
    }

    fn subscribe(registry: &mut Registry, key: &str, hint: Option<&str>, listener: Listener) {
        registry.subscribe(key, hint, listener, RegistrationId::next());
    }

    fn recorded(calls: &Calls) -> Result<Vec<(&'static str, String, Value)>, String> {
        calls
            .lock()
            .map(|guard| guard.clone())
            .map_err(|err| format!("lock poisoned: {}", err))
    }

    #[test]
    fn fresh_subscribe_uses_sentinel_token() -> Result<(), String> {
        let mut registry = Registry::default();
        subscribe(&mut registry, "sample", None, Listener::new(|_, _| {}));
        if registry.token("sample") != Some(CURRENT_VALUE_TOKEN) {
            return Err(format!("Unexpected token: {:?}", registry.token("sample")));
        }
        Ok(())
    }

    #[test]
    fn hint_is_used_for_untracked_key() -> Result<(), String> {
        let mut registry = Registry::default();
        subscribe(&mut registry, "threads", Some("12"), Listener::new(|_, _| {}));
        if registry.token("threads") != Some("12") {
            return Err(format!("Unexpected token: {:?}", registry.token("threads")));
        }
        Ok(())
    }

    #[test]
    fn conflicting_hint_resets_to_sentinel() -> Result<(), String> {
        let mut registry = Registry::default();
        subscribe(&mut registry, "k", Some("T1"), Listener::new(|_, _| {}));
        subscribe(&mut registry, "k", Some("T2"), Listener::new(|_, _| {}));
        if registry.token("k") != Some(CURRENT_VALUE_TOKEN) {
            return Err(format!("Unexpected token: {:?}", registry.token("k")));
        }
        Ok(())
    }

    #[test]
    fn matching_hint_keeps_token() -> Result<(), String> {
        let mut registry = Registry::default();
        subscribe(&mut registry, "k", Some("T1"), Listener::new(|_, _| {}));
        subscribe(&mut registry, "k", Some("T1"), Listener::new(|_, _| {}));
        if registry.token("k") != Some("T1") {
            return Err(format!("Unexpected token: {:?}", registry.token("k")));
        }
        if registry.listener_count("k") != 2 {
            return Err("Expected two listeners".to_owned());
        }
        Ok(())
    }

    #[test]
    fn resubscribe_replaces_entry() -> Result<(), String> {
        let calls = Calls::default();
        let mut registry = Registry::default();
        let listener = recording("a", &calls);
        subscribe(&mut registry, "k", None, listener.clone());
        subscribe(&mut registry, "k", None, listener);
        if registry.listener_count("k") != 1 {
            return Err(format!(
                "Expected one entry, got {}",
                registry.listener_count("k")
            ));
        }

        registry.deliver(PollUpdate::new("k", json!(1), "2"));
        if recorded(&calls)?.len() != 1 {
            return Err("Listener should be invoked once per update".to_owned());
        }
        Ok(())
    }

    #[test]
    fn resubscribing_sole_listener_takes_new_hint() -> Result<(), String> {
        let mut registry = Registry::default();
        let listener = Listener::new(|_, _| {});
        subscribe(&mut registry, "k", Some("T1"), listener.clone());
        subscribe(&mut registry, "k", Some("T2"), listener);
        if registry.token("k") != Some("T2") {
            return Err(format!("Unexpected token: {:?}", registry.token("k")));
        }
        Ok(())
    }

    #[test]
    fn deliver_fans_out_in_registration_order_then_advances() -> Result<(), String> {
        let calls = Calls::default();
        let mut registry = Registry::default();
        subscribe(&mut registry, "k", None, recording("first", &calls));
        subscribe(&mut registry, "k", None, recording("second", &calls));

        let delivery = registry.deliver(PollUpdate::new("k", json!({"tps": 3}), "T3"));
        if delivery != (Delivery::Delivered { listeners: 2 }) {
            return Err(format!("Unexpected delivery: {:?}", delivery));
        }
        let labels: Vec<&str> = recorded(&calls)?
            .iter()
            .map(|(label, _, _)| *label)
            .collect();
        if labels != ["first", "second"] {
            return Err(format!("Unexpected order: {:?}", labels));
        }
        if registry.token("k") != Some("T3") {
            return Err(format!("Token not advanced: {:?}", registry.token("k")));
        }
        Ok(())
    }

    #[test]
    fn unknown_key_is_ignored() -> Result<(), String> {
        let calls = Calls::default();
        let mut registry = Registry::default();
        subscribe(&mut registry, "a", None, recording("a", &calls));

        let delivery = registry.deliver(PollUpdate::new("c", json!(null), "9"));
        if delivery
            != (Delivery::UnknownKey {
                key: "c".to_owned(),
            })
        {
            return Err(format!("Unexpected delivery: {:?}", delivery));
        }
        if !recorded(&calls)?.is_empty() {
            return Err("No listener should run".to_owned());
        }
        if registry.token("c").is_some() || registry.key_count() != 1 {
            return Err("Unknown key must not be tracked".to_owned());
        }
        Ok(())
    }

    #[test]
    fn removing_last_listener_drops_key() -> Result<(), String> {
        let mut registry = Registry::default();
        let a = Listener::new(|_, _| {});
        let b = Listener::new(|_, _| {});
        subscribe(&mut registry, "a", None, a.clone());
        subscribe(&mut registry, "b", None, b);

        if !registry.unsubscribe("a", a.id()) {
            return Err("Expected key to be dropped".to_owned());
        }
        let request = registry.snapshot();
        let keys: Vec<&str> = request.keys().collect();
        if keys != ["b"] {
            return Err(format!("Unexpected keys: {:?}", keys));
        }
        if registry.unsubscribe("a", a.id()) {
            return Err("Second unsubscribe should be a no-op".to_owned());
        }
        Ok(())
    }

    #[test]
    fn removing_one_of_two_listeners_keeps_key() -> Result<(), String> {
        let mut registry = Registry::default();
        let a = Listener::new(|_, _| {});
        subscribe(&mut registry, "k", Some("5"), a.clone());
        subscribe(&mut registry, "k", Some("5"), Listener::new(|_, _| {}));

        if registry.unsubscribe("k", a.id()) {
            return Err("Key should survive".to_owned());
        }
        if registry.token("k") != Some("5") {
            return Err("Token should be kept".to_owned());
        }
        Ok(())
    }

    #[test]
    fn superseded_registration_releases_nothing() -> Result<(), String> {
        let mut registry = Registry::default();
        let listener = Listener::new(|_, _| {});
        let first = RegistrationId::next();
        let second = RegistrationId::next();
        registry.subscribe("k", None, listener.clone(), first);
        registry.subscribe("k", Some("5"), listener, second);

        if registry.release("k", first) {
            return Err("Old registration must not drop the key".to_owned());
        }
        if registry.listener_count("k") != 1 || registry.token("k") != Some("5") {
            return Err("Current registration should survive".to_owned());
        }
        if !registry.release("k", second) {
            return Err("Current registration should drop the key".to_owned());
        }
        Ok(())
    }
}
