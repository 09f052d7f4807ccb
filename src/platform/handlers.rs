use std::collections::HashMap;

use crate::error::DispatchError;
use crate::ops::OperationRegistry;
use crate::ops::catalog::CATALOG;

/// How a catalog operation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Forwarded to [`Platform::invoke`](super::Platform::invoke).
    Platform,
    /// Delete a category's channels one by one, then the category.
    CategoryCascade,
    /// Provider health report served from the LLM chain.
    ApiStatus,
}

/// Operations executed locally instead of by the platform client.
const LOCAL_HANDLERS: &[(&str, Handler)] = &[
    ("delete_category_and_channels", Handler::CategoryCascade),
    ("get_api_status", Handler::ApiStatus),
];

/// Operation name to handler mapping.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for the built-in catalog.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for spec in CATALOG {
            table.register(spec.name, Handler::Platform);
        }
        for (name, handler) in LOCAL_HANDLERS {
            table.register(*name, *handler);
        }
        table
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Result<Handler, DispatchError> {
        self.handlers
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::MissingHandler {
                name: name.to_string(),
            })
    }

    /// Every registry operation has a handler and every handler names a
    /// registry operation.
    pub fn validate(&self, registry: &OperationRegistry) -> Result<(), DispatchError> {
        for spec in registry.list_all() {
            self.get(spec.name)?;
        }
        if let Some(orphan) = self.handlers.keys().find(|name| !registry.contains(name)) {
            return Err(DispatchError::OrphanHandler {
                name: orphan.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_matches_catalog() {
        let registry = OperationRegistry::builtin();
        let table = HandlerTable::standard();
        table.validate(&registry).unwrap();
        assert_eq!(
            table.get("delete_category_and_channels").unwrap(),
            Handler::CategoryCascade
        );
        assert_eq!(table.get("ban_member").unwrap(), Handler::Platform);
    }

    #[test]
    fn missing_handler_fails_validation() {
        let registry = OperationRegistry::builtin();
        let err = HandlerTable::new().validate(&registry).unwrap_err();
        assert!(matches!(err, DispatchError::MissingHandler { .. }));
    }

    #[test]
    fn orphan_handler_fails_validation() {
        let registry = OperationRegistry::builtin();
        let mut table = HandlerTable::standard();
        table.register("summon_dragons", Handler::Platform);
        let err = table.validate(&registry).unwrap_err();
        assert!(matches!(err, DispatchError::OrphanHandler { ref name } if name == "summon_dragons"));
    }
}
