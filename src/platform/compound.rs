//! Operations implemented locally on top of several platform calls.

use crate::batch::BatchReport;
use crate::error::PlatformError;
use crate::llm::{ProviderStatus, display_model_name};
use crate::ops::{Arguments, arg_str, arg_u64};

use super::Platform;

/// Delete every channel in a category, then the category itself.
///
/// Issues one call per channel plus one for the category. Individual
/// failures are recorded and do not stop the cascade. Only a missing
/// category is returned as an error.
pub async fn delete_category_and_channels(
    platform: &dyn Platform,
    arguments: &Arguments,
) -> Result<String, PlatformError> {
    let guild_id = arg_u64(arguments, "guild_id")?;
    let name = arg_str(arguments, "category_name")?;
    let category = platform.find_category(guild_id, name).await?;

    let mut report = BatchReport::new(format!(
        "🗑️ Deleted category '{}' and its {} channels",
        category.name,
        category.channels.len()
    ));

    for channel in &category.channels {
        match platform.delete_channel_by_id(guild_id, channel.id).await {
            Ok(()) => report.succeed(format!("#{}", channel.name)),
            Err(err) => {
                tracing::warn!(
                    channel = %channel.name,
                    error = %err,
                    "Failed to delete channel during category cascade"
                );
                report.fail(format!("#{}", channel.name), err);
            }
        }
    }

    let label = format!("category '{}'", category.name);
    match platform.delete_channel_by_id(guild_id, category.id).await {
        Ok(()) => report.succeed(label),
        Err(err) => report.fail(label, err),
    }

    if report.failures() > 0 {
        tracing::warn!(
            category = %category.name,
            failed = report.failures(),
            succeeded = report.successes(),
            "Category cascade finished with failures"
        );
    }
    Ok(report.render())
}

/// Render the provider health table for `get_api_status`.
pub fn render_api_status(statuses: &[ProviderStatus]) -> String {
    if statuses.is_empty() {
        return "🔌 **API Status**\nNo language-model providers are configured; \
                requests are handled by pattern matching only."
            .to_string();
    }

    let mut out = String::from("🔌 **API Status**");
    for (priority, status) in statuses.iter().enumerate() {
        let marker = if status.is_healthy() { "✅" } else { "❌" };
        out.push_str(&format!(
            "\n{} {}. {} ({}): {} ok, {} failed",
            marker,
            priority + 1,
            status.provider,
            display_model_name(&status.model),
            status.successes,
            status.failures
        ));
        if let Some(err) = &status.last_error {
            out.push_str(&format!(" (last error: {err})"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::platform::MemoryPlatform;

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn cascade_deletes_channels_then_category() {
        let platform = MemoryPlatform::demo();
        let guild = platform.demo_guild_id();

        let text = delete_category_and_channels(
            &platform,
            &args(json!({"guild_id": guild, "category_name": "voice rooms"})),
        )
        .await
        .unwrap();

        assert!(text.contains("4 succeeded, 0 failed"), "{text}");
        assert!(text.contains("✅ #Lounge"));
        assert!(platform.find_category(guild, "Voice Rooms").await.is_err());
    }

    #[tokio::test]
    async fn cascade_on_missing_category_is_not_found() {
        let platform = MemoryPlatform::demo();
        let err = delete_category_and_channels(
            &platform,
            &args(json!({"guild_id": platform.demo_guild_id(), "category_name": "nope"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[test]
    fn api_status_marks_unhealthy_providers() {
        let text = render_api_status(&[
            ProviderStatus {
                provider: "openrouter".into(),
                model: "deepseek/deepseek-chat-v3-0324:free".into(),
                successes: 0,
                failures: 2,
                last_error: Some("rate limited".into()),
            },
            ProviderStatus {
                provider: "google".into(),
                model: "gemini-1.5-flash".into(),
                successes: 4,
                failures: 0,
                last_error: None,
            },
        ]);
        assert!(text.contains("❌ 1. openrouter (deepseek-chat-v3-0324)"));
        assert!(text.contains("last error: rate limited"));
        assert!(text.contains("✅ 2. google (gemini-1.5-flash): 4 ok"));
    }
}
