//! End-to-end dispatch scenarios against recording doubles.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use warden::commands::{CommandRouter, Origin, SlashCommand};
use warden::config::DispatchConfig;
use warden::confirm::{CONFIRM_MARKER, Principal};
use warden::dispatch::{Dispatcher, Request};
use warden::llm::{LlmProvider, ToolCall};
use warden::platform::{GuildId, UserId};
use warden::testing::{RecordingPlatform, ScriptedSurface, StubLlm};

const OWNER: UserId = 900;
const BOT: UserId = 1;
const GUILD: GuildId = 10;

fn dispatcher(platform: &Arc<RecordingPlatform>) -> Arc<Dispatcher> {
    let config = DispatchConfig {
        confirm_timeout: Duration::from_secs(30),
        ..DispatchConfig::default()
    };
    Arc::new(Dispatcher::new(platform.clone(), None, OWNER, BOT, config).unwrap())
}

fn owner_request(text: &str) -> Request {
    Request::new(Principal::new(OWNER, "owner"), GUILD, "Test Server", text)
}

fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: format!("call-{name}"),
        name: name.to_string(),
        arguments,
    }
}

#[tokio::test]
async fn denied_confirmation_never_reaches_platform() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());
    surface.queue_reply(OWNER, "no");

    let reply = dispatcher
        .handle(
            &owner_request("delete the general channel"),
            surface.clone(),
            Some(call("delete_channel", json!({"channel_name": "general"}))),
        )
        .await;

    assert!(reply.starts_with("❌ Operation cancelled"), "{reply}");
    assert_eq!(platform.call_count(), 0);
    let edits = surface.edits();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].1.contains("Cancelled"));
}

#[tokio::test]
async fn batch_keeps_going_after_a_failed_item() {
    let platform = Arc::new(RecordingPlatform::new());
    platform.fail_when("create_channel", "name", "beta");
    let dispatcher = dispatcher(&platform);

    let reply = dispatcher
        .handle(
            &owner_request("make alpha beta gamma"),
            Arc::new(ScriptedSurface::new()),
            Some(call(
                "create_multiple_channels",
                json!({"names": ["alpha", "beta", "gamma"]}),
            )),
        )
        .await;

    assert!(reply.contains("2 succeeded, 1 failed"), "{reply}");
    assert!(reply.contains("✅ #alpha"));
    assert!(reply.contains("❌ #beta"));
    assert!(reply.contains("✅ #gamma"));
    let names: Vec<String> = platform
        .calls()
        .iter()
        .map(|c| c.arg("name").to_string())
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn pattern_matched_batch_without_a_model() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);

    let reply = dispatcher
        .handle(
            &owner_request("create 2 voice channels called Lounge and Gaming"),
            Arc::new(ScriptedSurface::new()),
            None,
        )
        .await;

    assert!(reply.contains("2 succeeded, 0 failed"), "{reply}");
    let calls = platform.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.operation == "create_channel"));
    assert!(calls.iter().all(|c| c.arg("channel_type") == "voice"));
}

#[tokio::test(start_paused = true)]
async fn unanswered_confirmation_times_out_without_dispatch() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let reply = dispatcher
        .handle(
            &owner_request("ban bob"),
            surface.clone(),
            Some(call("ban_member", json!({"member": "bob"}))),
        )
        .await;

    assert!(reply.starts_with("⏰"), "{reply}");
    assert_eq!(platform.call_count(), 0);
    assert!(surface.edits()[0].1.contains("Timed out"));
    assert!(dispatcher.pending().is_empty().await);
}

#[tokio::test]
async fn newer_command_supersedes_open_confirmation() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        let surface = surface.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(
                    &owner_request("delete general"),
                    surface,
                    Some(call("delete_channel", json!({"channel_name": "general"}))),
                )
                .await
        })
    };
    let notice = surface.next_notice().await;

    let second = dispatcher
        .handle(&owner_request("list roles"), surface.clone(), None)
        .await;
    assert_eq!(second, "ok: list_roles");

    let first = first.await.unwrap();
    assert!(first.starts_with("❌ Operation cancelled"), "{first}");

    // A late answer to the superseded notice changes nothing.
    surface.react(&notice, OWNER, false, CONFIRM_MARKER);
    tokio::task::yield_now().await;

    let ops: Vec<String> = platform.calls().into_iter().map(|c| c.operation).collect();
    assert_eq!(ops, vec!["list_roles"]);
    assert!(surface.edits()[0].1.contains("Superseded"));
}

#[tokio::test]
async fn simultaneous_answers_resolve_once() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let surface = surface.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(
                    &owner_request("kick carol"),
                    surface,
                    Some(call("delete_role", json!({"role_name": "Member"}))),
                )
                .await
        })
    };
    let notice = surface.next_notice().await;
    surface.react(&notice, OWNER, false, CONFIRM_MARKER);
    surface.reply(&notice, OWNER, false, "no");

    let reply = task.await.unwrap();
    assert_eq!(surface.edits().len(), 1);
    if reply.starts_with("❌") {
        assert_eq!(platform.call_count(), 0);
    } else {
        assert_eq!(reply, "ok: delete_role");
        assert_eq!(platform.call_count(), 1);
    }
}

#[tokio::test]
async fn only_the_requester_can_answer() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let surface = surface.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(
                    &owner_request("ban bob"),
                    surface,
                    Some(call("ban_member", json!({"member": "bob"}))),
                )
                .await
        })
    };
    let notice = surface.next_notice().await;
    surface.reply(&notice, 555, false, "yes");
    surface.react(&notice, BOT, true, CONFIRM_MARKER);
    surface.react(&notice, 556, false, CONFIRM_MARKER);
    surface.reply(&notice, OWNER, false, "no");

    let reply = task.await.unwrap();
    assert!(reply.starts_with("❌ Operation cancelled"), "{reply}");
    assert_eq!(platform.call_count(), 0);
}

#[tokio::test]
async fn non_admin_cannot_run_dangerous_operations() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let request = Request::new(Principal::new(42, "member"), GUILD, "Test Server", "ban bob");
    let reply = dispatcher
        .handle(
            &request,
            surface.clone(),
            Some(call("ban_member", json!({"member": "bob"}))),
        )
        .await;

    assert!(reply.starts_with("❌ Operation cancelled"), "{reply}");
    assert!(surface.published().is_empty());
    assert_eq!(platform.call_count(), 0);

    let reply = dispatcher
        .handle(&request, surface.clone(), Some(call("list_roles", json!({}))))
        .await;
    assert_eq!(reply, "ok: list_roles");
}

#[tokio::test]
async fn administrator_can_confirm() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());
    surface.queue_reply(42, "y");

    let request = Request::new(
        Principal::new(42, "mod").administrator(),
        GUILD,
        "Test Server",
        "ban bob",
    );
    let reply = dispatcher
        .handle(
            &request,
            surface,
            Some(call("ban_member", json!({"member": "bob", "reason": "spam"}))),
        )
        .await;

    assert_eq!(reply, "ok: ban_member");
    let calls = platform.calls();
    assert_eq!(calls[0].arg("reason"), "spam");
    assert_eq!(calls[0].arguments["guild_id"], json!(GUILD));
}

#[tokio::test]
async fn category_cascade_reports_each_channel() {
    let platform = Arc::new(RecordingPlatform::new());
    platform.add_category("Old Stuff", 101, &["logs", "tmp", "archive"]);
    platform.fail_delete_id(102);
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());
    surface.queue_reply(OWNER, "yes");

    let reply = dispatcher
        .handle(
            &owner_request("delete the Old Stuff category and everything in it"),
            surface,
            Some(call(
                "delete_category_and_channels",
                json!({"category_name": "old stuff"}),
            )),
        )
        .await;

    assert!(reply.contains("3 succeeded, 1 failed"), "{reply}");
    assert!(reply.contains("❌ #tmp"));
    let ids: Vec<Value> = platform
        .calls()
        .iter()
        .map(|c| c.arguments["channel_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(101), json!(102), json!(103), json!(100)]);
}

#[tokio::test]
async fn interleaving_servers_is_refused_while_confirmation_is_open() {
    let platform = Arc::new(RecordingPlatform::new());
    let dispatcher = dispatcher(&platform);
    let surface = Arc::new(ScriptedSurface::new());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let surface = surface.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(
                    &owner_request("delete general"),
                    surface,
                    Some(call("delete_channel", json!({"channel_name": "general"}))),
                )
                .await
        })
    };
    let notice = surface.next_notice().await;

    let elsewhere = Request::new(Principal::new(OWNER, "owner"), 20, "Other", "list roles");
    let reply = dispatcher.handle(&elsewhere, surface.clone(), None).await;
    assert!(reply.starts_with("🚫"), "{reply}");

    surface.reply(&notice, OWNER, false, "yes");
    assert_eq!(task.await.unwrap(), "ok: delete_channel");
    assert_eq!(platform.call_count(), 1);
}

#[tokio::test]
async fn failed_model_falls_back_to_patterns() {
    let platform = Arc::new(RecordingPlatform::new());
    let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm::failing("openrouter"));
    let dispatcher = Dispatcher::new(
        platform.clone(),
        Some(llm),
        OWNER,
        BOT,
        DispatchConfig::default(),
    )
    .unwrap();

    let reply = dispatcher
        .handle(
            &owner_request("list channels"),
            Arc::new(ScriptedSurface::new()),
            None,
        )
        .await;
    assert_eq!(reply, "ok: list_channels");

    let reply = dispatcher
        .handle(
            &owner_request("what's the weather like"),
            Arc::new(ScriptedSurface::new()),
            None,
        )
        .await;
    assert!(reply.contains("API Service Temporarily Unavailable"));
}

#[tokio::test]
async fn slash_command_runs_without_resolution() {
    let platform = Arc::new(RecordingPlatform::new());
    let router = CommandRouter::new(dispatcher(&platform), OWNER, "¬askai");
    let origin = Origin {
        principal: Principal::new(OWNER, "owner"),
        guild_id: GUILD,
        guild_name: "Test Server".into(),
    };

    let reply = router
        .on_slash(
            SlashCommand::CreateRole {
                name: "Helpers".into(),
                color: None,
                permissions: None,
            },
            &origin,
            Arc::new(ScriptedSurface::new()),
        )
        .await;

    assert_eq!(reply, vec!["ok: create_role"]);
    assert_eq!(platform.calls()[0].arg("role_name"), "Helpers");
}
