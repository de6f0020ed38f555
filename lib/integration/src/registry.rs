//! App capability registry.
//!
//! Apps register their actions and polling triggers under
//! `(app id, capability name)` keys. The engine resolves node bindings
//! through this registry, so adding a vendor never touches engine code.

use crate::action::Action;
use crate::error::RegistryError;
use crate::trigger::PollingTrigger;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of app-provided actions and polling triggers.
#[derive(Default)]
pub struct AppRegistry {
    actions: HashMap<(String, String), Arc<dyn Action>>,
    triggers: HashMap<(String, String), Arc<dyn PollingTrigger>>,
}

impl AppRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under `(app_id, action_id)`.
    pub fn register_action(
        &mut self,
        app_id: impl Into<String>,
        action_id: impl Into<String>,
        action: Arc<dyn Action>,
    ) {
        self.actions.insert((app_id.into(), action_id.into()), action);
    }

    /// Registers a polling trigger under `(app_id, trigger_id)`.
    pub fn register_trigger(
        &mut self,
        app_id: impl Into<String>,
        trigger_id: impl Into<String>,
        trigger: Arc<dyn PollingTrigger>,
    ) {
        self.triggers
            .insert((app_id.into(), trigger_id.into()), trigger);
    }

    /// Resolves an action binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAction`] when nothing is registered
    /// under the binding.
    pub fn action(&self, app_id: &str, action_id: &str) -> Result<Arc<dyn Action>, RegistryError> {
        self.actions
            .get(&(app_id.to_string(), action_id.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAction {
                app_id: app_id.to_string(),
                action_id: action_id.to_string(),
            })
    }

    /// Resolves a polling trigger binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTrigger`] when nothing is registered
    /// under the binding.
    pub fn trigger(
        &self,
        app_id: &str,
        trigger_id: &str,
    ) -> Result<Arc<dyn PollingTrigger>, RegistryError> {
        self.triggers
            .get(&(app_id.to_string(), trigger_id.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTrigger {
                app_id: app_id.to_string(),
                trigger_id: trigger_id.to_string(),
            })
    }

    /// Returns the number of registered actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}
