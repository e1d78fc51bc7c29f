use super::{ComponentState, TmCaptureOrchestrator};
use std::collections::HashMap;
use tracing::debug;

pub(super) const SIMULATOR: &str = "simulator";
pub(super) const ACQUISITION: &str = "acquisition";
pub(super) const KEYBOARD: &str = "keyboard";

impl TmCaptureOrchestrator {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        debug!("Component '{}' -> {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// Names of components currently in `state`, sorted
    pub async fn components_in(&self, state: ComponentState) -> Vec<String> {
        let states = self.component_states.lock().await;
        let mut names: Vec<String> = states
            .iter()
            .filter(|(_, current)| **current == state)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
