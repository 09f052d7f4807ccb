//! Catalog inspection CLI commands.

use serde_json::json;

use crate::intent::{IntentResolver, PseudoOperation, Resolution};
use crate::ops::OperationRegistry;
use crate::platform::GuildId;

/// Print the operation catalog.
pub fn run_ops_command(verbose: bool, as_json: bool) -> anyhow::Result<()> {
    let registry = OperationRegistry::builtin();

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&registry.tool_definitions())?
        );
        return Ok(());
    }

    println!("{} operations:\n", registry.len());
    for spec in registry.list_all() {
        let marker = if spec.dangerous { "!" } else { " " };
        println!("  {marker} {:<32} {}", spec.name, spec.description);
        if verbose {
            for param in spec.parameters {
                println!(
                    "        {}{}: {:?}",
                    param.name,
                    if param.required { "" } else { "?" },
                    param.param_type
                );
            }
        }
    }
    println!("\n  ! requires confirmation");
    println!(
        "\nBatch forms: {}, {}",
        PseudoOperation::CreateMultipleChannels.name(),
        PseudoOperation::CreateMultipleRoles.name()
    );
    Ok(())
}

/// Print how the pattern matcher reads `text`, without executing anything.
pub fn run_resolve_command(text: &str, guild_id: GuildId) -> anyhow::Result<()> {
    let registry = OperationRegistry::builtin();
    let resolver = IntentResolver::new(&registry);

    let output = match resolver.resolve(text, guild_id) {
        Resolution::Help(topic) => json!({
            "kind": "help",
            "topic": format!("{topic:?}"),
        }),
        Resolution::Invocation(invocation) => {
            let dangerous = match PseudoOperation::parse(&invocation.operation) {
                Some(pseudo) => registry.is_dangerous(pseudo.underlying()),
                None => registry.is_dangerous(&invocation.operation),
            };
            json!({
                "kind": "invocation",
                "invocation": invocation,
                "dangerous": dangerous,
            })
        }
        Resolution::None => json!({ "kind": "none" }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
