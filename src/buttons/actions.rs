//! Named button actions, looked up by (prefix, name).

use std::collections::{HashMap, HashSet};

use crate::error::ButtonError;
use crate::registry::Handler;

/// Button actions contributed by modules at startup.
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    prefixes: HashSet<String>,
    actions: HashMap<(String, String), Handler>,
}

impl ActionRegistry {
    pub fn register(&mut self, prefix: &str, name: &str, handler: Handler) {
        self.prefixes.insert(prefix.to_string());
        self.actions
            .insert((prefix.to_string(), name.to_string()), handler);
    }

    /// Whether callback data with this prefix belongs to the button protocol.
    pub fn claims(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    pub fn resolve(&self, prefix: &str, name: &str) -> Result<&Handler, ButtonError> {
        self.actions
            .get(&(prefix.to_string(), name.to_string()))
            .ok_or_else(|| ButtonError::UnknownAction {
                prefix: prefix.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let mut actions = ActionRegistry::default();
        actions.register("customdb", "cancel", Handler::anonymous(|_| async { Ok(()) }));

        assert!(actions.claims("customdb"));
        assert!(!actions.claims("unwarn"));
        assert!(actions.resolve("customdb", "cancel").is_ok());
        assert!(matches!(
            actions.resolve("customdb", "list"),
            Err(ButtonError::UnknownAction { ref name, .. }) if name == "list"
        ));
    }
}
