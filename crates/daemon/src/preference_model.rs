//! `PreferenceModel` — thin learning layer over
//! `omnibrain_store::Store`'s preference table: resolves conflicting
//! writes by letting only a more (or equally) confident observation
//! override a held belief, so a single noisy signal cannot clobber a
//! preference the user has confirmed directly.

use std::sync::Arc;

use omnibrain_store::Store;
use serde_json::Value;

pub struct PreferenceModel {
    store: Arc<Store>,
}

impl PreferenceModel {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str, default: Value) -> Value {
        self.store.get_preference(key, default.clone()).unwrap_or(default)
    }

    /// Explicit user-stated preferences always win.
    pub fn set_explicit(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.store.set_preference(key, &value, 1.0, "user")
    }

    /// An inferred preference only overwrites what's stored if it's at
    /// least as confident as the current value (confidence 0.0 for an
    /// unset key, so any learned observation can seed it).
    pub fn learn(&self, key: &str, value: Value, confidence: f32, learned_from: &str) -> anyhow::Result<bool> {
        let current_confidence = self.store.get_preference_with_confidence(key)?.map(|(_, c)| c).unwrap_or(0.0);
        if confidence < current_confidence {
            return Ok(false);
        }
        self.store.set_preference(key, &value, confidence, learned_from)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_preference_round_trips() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let model = PreferenceModel::new(store);
        model.set_explicit("user_name", Value::String("Dana".into())).unwrap();
        assert_eq!(model.get("user_name", Value::Null), Value::String("Dana".into()));
    }

    #[test]
    fn learn_seeds_an_unset_key() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let model = PreferenceModel::new(store);
        let applied = model.learn("timezone", Value::String("America/New_York".into()), 0.4, "inference").unwrap();
        assert!(applied);
        assert_eq!(model.get("timezone", Value::Null), Value::String("America/New_York".into()));
    }

    #[test]
    fn learn_does_not_override_an_explicit_preference() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let model = PreferenceModel::new(store);
        model.set_explicit("timezone", Value::String("UTC".into())).unwrap();
        let applied = model.learn("timezone", Value::String("America/New_York".into()), 0.4, "inference").unwrap();
        assert!(!applied);
        assert_eq!(model.get("timezone", Value::Null), Value::String("UTC".into()));
    }
}
