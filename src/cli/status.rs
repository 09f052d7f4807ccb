//! Configuration check CLI command.

use crate::config::{Config, SandboxConfig, resolve_owner_id};
use crate::llm::{ChatMessage, ToolCompletionRequest, create_provider_chain, display_model_name};

/// Print what the bot would start with, then fail if startup would fail.
pub async fn run_check_command(probe: bool) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    println!("Warden Configuration");
    println!("====================\n");

    println!(
        "  Version:     {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    print!("  Bot token:   ");
    if std::env::var("DISCORD_BOT_TOKEN").is_ok_and(|v| !v.trim().is_empty()) {
        println!("set");
    } else {
        println!("missing (DISCORD_BOT_TOKEN)");
    }

    print!("  Owner:       ");
    match resolve_owner_id() {
        Ok(id) => println!("{id}"),
        Err(e) => println!("error ({e})"),
    }

    let sandbox = SandboxConfig::from_env()?;
    println!(
        "  Confirm:     {}s timeout, narration {}",
        sandbox.dispatch.confirm_timeout.as_secs(),
        if sandbox.dispatch.narrate_results { "on" } else { "off" }
    );

    println!("  Providers:   {}", sandbox.llm.providers.len());
    for (i, provider) in sandbox.llm.providers.iter().enumerate() {
        println!(
            "    {}. {} ({}) via {}",
            i + 1,
            provider.name,
            display_model_name(&provider.model),
            provider.api_key_env
        );
    }

    if probe && !sandbox.llm.providers.is_empty() {
        print!("\n  Probe:       ");
        let chain = create_provider_chain(&sandbox.llm)?;
        let request = ToolCompletionRequest::new(
            vec![ChatMessage::user("Reply with the single word: ready")],
            Vec::new(),
        )
        .with_max_tokens(8);
        match chain.complete_with_tools(request).await {
            Ok(response) => println!(
                "ok ({} / {})",
                response.provider,
                display_model_name(&response.model)
            ),
            Err(e) => println!("failed ({e})"),
        }
    }

    println!();
    match Config::from_env() {
        Ok(_) => {
            println!("Configuration is complete.");
            Ok(())
        }
        Err(e) => {
            println!("Startup would fail: {e}");
            Err(e.into())
        }
    }
}
