//! Operation registry.
//!
//! A static catalog mapping operation name to parameter schema and danger
//! flag. Built once at startup from the compiled-in table in
//! [`catalog`] and never mutated.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               OperationRegistry               │
//! │                                               │
//! │  lookup(name)       -> &OperationSpec         │
//! │  is_dangerous(name) -> bool  (unknown = true) │
//! │  list_all()         -> catalog order          │
//! │  tool_definitions() -> model tool catalog     │
//! └───────────────────────────────────────────────┘
//! ```

pub mod catalog;

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::error::{DispatchError, PlatformError};
use crate::llm::ToolDefinition;

/// Named arguments of an invocation.
pub type Arguments = serde_json::Map<String, Value>;

/// Declared type of an operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    StringList,
}

impl ParamType {
    fn json_type(self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
        }
    }

    /// Whether a JSON value is acceptable for this type.
    ///
    /// Integers also accept numeric strings since models often quote ids.
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => {
                value.is_u64()
                    || value.is_i64()
                    || value.as_str().is_some_and(|s| s.trim().parse::<i64>().is_ok())
            }
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: false,
            description,
        }
    }
}

/// Immutable description of a catalog operation.
#[derive(Debug)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParamSpec],
    pub dangerous: bool,
}

impl OperationSpec {
    /// JSON Schema object for the parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in self.parameters {
            let mut schema = param.param_type.json_type();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".into(), Value::from(param.description));
            }
            properties.insert(param.name.to_string(), schema);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_tool_definition(&self) -> ToolDefinition {
        let description = if self.dangerous {
            format!("{} Requires confirmation.", self.description)
        } else {
            self.description.to_string()
        };
        ToolDefinition {
            name: self.name.to_string(),
            description,
            parameters: self.parameters_schema(),
        }
    }

    /// Check required parameters are present and typed as declared.
    ///
    /// Unknown extra arguments are tolerated.
    pub fn validate_arguments(&self, arguments: &Arguments) -> Result<(), DispatchError> {
        for param in self.parameters {
            match arguments.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(DispatchError::MissingArgument {
                        operation: self.name.to_string(),
                        argument: param.name.to_string(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(DispatchError::InvalidArgument {
                        operation: self.name.to_string(),
                        argument: param.name.to_string(),
                        reason: format!("expected {:?}, got {}", param.param_type, value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Lookup table over the operation catalog.
pub struct OperationRegistry {
    by_name: HashMap<&'static str, &'static OperationSpec>,
    ordered: &'static [OperationSpec],
}

impl OperationRegistry {
    /// Registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self::from_table(catalog::CATALOG)
    }

    /// Build from a static table. Later duplicates are ignored with a warning.
    pub fn from_table(table: &'static [OperationSpec]) -> Self {
        let mut by_name = HashMap::with_capacity(table.len());
        for spec in table {
            if by_name.insert(spec.name, spec).is_some() {
                tracing::warn!(operation = spec.name, "Duplicate operation in catalog");
            }
        }
        Self {
            by_name,
            ordered: table,
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&'static OperationSpec, DispatchError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// Whether `name` needs confirmation. Unknown names are dangerous.
    pub fn is_dangerous(&self, name: &str) -> bool {
        self.by_name.get(name).is_none_or(|spec| spec.dangerous)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All operations in catalog order.
    pub fn list_all(&self) -> &'static [OperationSpec] {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Tool catalog offered to the remote model.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.ordered.iter().map(OperationSpec::to_tool_definition).collect()
    }

    /// Reply text for an operation name that is not in the catalog.
    pub fn unknown_operation_help(&self, name: &str) -> String {
        let names: Vec<&str> = self.ordered.iter().map(|s| s.name).collect();
        format!(
            "❓ Unknown function `{}`. Available operations: {}",
            name,
            names.join(", ")
        )
    }
}

/// Required string argument.
pub fn arg_str<'a>(arguments: &'a Arguments, key: &str) -> Result<&'a str, PlatformError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlatformError::validation(key, "a non-empty text value is required"))
}

/// Optional string argument; empty strings count as absent.
pub fn arg_opt_str<'a>(arguments: &'a Arguments, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Required unsigned integer argument, accepting numeric strings.
pub fn arg_u64(arguments: &Arguments, key: &str) -> Result<u64, PlatformError> {
    arg_opt_u64(arguments, key)?
        .ok_or_else(|| PlatformError::validation(key, "a whole number is required"))
}

/// Optional unsigned integer argument, accepting numeric strings.
pub fn arg_opt_u64(arguments: &Arguments, key: &str) -> Result<Option<u64>, PlatformError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| PlatformError::validation(key, format!("{n} is not a whole number"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| PlatformError::validation(key, format!("'{s}' is not a whole number"))),
        Some(other) => Err(PlatformError::validation(
            key,
            format!("{other} is not a whole number"),
        )),
    }
}

/// String list argument; a comma-separated string is split.
pub fn arg_str_list(arguments: &Arguments, key: &str) -> Result<Vec<String>, PlatformError> {
    match arguments.get(key) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()),
        _ => Err(PlatformError::validation(key, "a list of names is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flagged_operation_is_dangerous() {
        let registry = OperationRegistry::builtin();
        for spec in registry.list_all().iter().filter(|s| s.dangerous) {
            assert!(registry.is_dangerous(spec.name), "{} should be dangerous", spec.name);
        }
    }

    #[test]
    fn unknown_operations_fail_closed() {
        let registry = OperationRegistry::builtin();
        assert!(registry.is_dangerous("drop_everything"));
        assert!(registry.is_dangerous(""));
        assert!(registry.is_dangerous("create_multiple_channels"));
    }

    #[test]
    fn destructive_operations_are_flagged() {
        let registry = OperationRegistry::builtin();
        for name in [
            "delete_channel",
            "delete_category_and_channels",
            "delete_role",
            "kick_member",
            "ban_member",
            "timeout_member",
            "purge_messages",
            "delete_message_bulk",
            "update_role_permissions",
            "execute_cross_server_clone",
            "restore_server",
            "setup_word_filter",
            "setup_anti_spam",
            "create_invite_with_perms",
        ] {
            assert!(registry.contains(name), "{name} missing from catalog");
            assert!(registry.is_dangerous(name), "{name} should need confirmation");
        }
        for name in ["list_channels", "create_channel", "create_role", "get_server_stats"] {
            assert!(!registry.is_dangerous(name), "{name} should be safe");
        }
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let registry = OperationRegistry::builtin();
        assert!(matches!(
            registry.lookup("nope"),
            Err(DispatchError::UnknownOperation { .. })
        ));
        assert_eq!(registry.lookup("list_roles").unwrap().name, "list_roles");
    }

    #[test]
    fn catalog_names_are_unique() {
        let registry = OperationRegistry::builtin();
        assert_eq!(registry.len(), registry.list_all().len());
    }

    #[test]
    fn guild_id_required_everywhere_but_api_status() {
        let registry = OperationRegistry::builtin();
        for spec in registry.list_all() {
            let has_guild = spec
                .parameters
                .iter()
                .any(|p| p.name == "guild_id" && p.required);
            assert_eq!(has_guild, spec.name != "get_api_status", "{}", spec.name);
        }
    }

    #[test]
    fn tool_definition_schema_lists_required() {
        let registry = OperationRegistry::builtin();
        let def = registry.lookup("ban_member").unwrap().to_tool_definition();
        assert!(def.description.contains("Requires confirmation"));
        let required = def.parameters["required"].as_array().unwrap();
        assert!(required.contains(&Value::from("guild_id")));
        assert!(required.contains(&Value::from("member")));
        assert!(!required.contains(&Value::from("reason")));
        assert_eq!(def.parameters["properties"]["guild_id"]["type"], "integer");
    }

    #[test]
    fn validate_arguments_reports_missing_and_mistyped() {
        let registry = OperationRegistry::builtin();
        let spec = registry.lookup("delete_channel").unwrap();

        let mut args = Arguments::new();
        args.insert("guild_id".into(), json!("123"));
        assert!(matches!(
            spec.validate_arguments(&args),
            Err(DispatchError::MissingArgument { ref argument, .. }) if argument == "channel_name"
        ));

        args.insert("channel_name".into(), json!(5));
        assert!(matches!(
            spec.validate_arguments(&args),
            Err(DispatchError::InvalidArgument { .. })
        ));

        args.insert("channel_name".into(), json!("general"));
        assert!(spec.validate_arguments(&args).is_ok());
    }

    #[test]
    fn argument_helpers_accept_quoted_numbers() {
        let mut args = Arguments::new();
        args.insert("guild_id".into(), json!("42"));
        args.insert("limit".into(), json!(7));
        args.insert("names".into(), json!("a, b,,c"));
        assert_eq!(arg_u64(&args, "guild_id").unwrap(), 42);
        assert_eq!(arg_opt_u64(&args, "limit").unwrap(), Some(7));
        assert_eq!(arg_opt_u64(&args, "missing").unwrap(), None);
        assert_eq!(arg_str_list(&args, "names").unwrap(), vec!["a", "b", "c"]);
        assert!(arg_str(&args, "missing").is_err());
    }
}
