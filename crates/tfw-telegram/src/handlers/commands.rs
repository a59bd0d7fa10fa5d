use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use tfw_core::{
    commands::{describe_field, Command},
    domain::ChatId,
    errors::Error,
    formatting::{escape_html, format_duration},
    job::{JobSnapshot, RunOutcome, RunSummary},
    transport::ChatSummary,
};

use crate::router::AppState;

const HELP: &str = "Welcome to the Telegram Forwarder Bot!\n\n\
<b>Configure:</b>\n\
/setsource &lt;id&gt; - Source chat ID\n\
/setdest &lt;id&gt; - Destination channel ID\n\
/setstartid &lt;id&gt; - Start after this message ID\n\
/setbatchsize &lt;n&gt; - Messages per batch\n\
/setsleeptime &lt;seconds&gt; - Pause after each batch\n\
/setdelay &lt;seconds&gt; - Pause between messages\n\n\
<b>Run:</b>\n\
/listchats - Chats the bot has seen\n\
/forward - Start forwarding\n\
/stop - Stop forwarding and save progress\n\
/resume - Continue after the last forwarded message\n\
/stats - Progress and settings";

const NEED_IDS: &str =
    "Please set both source and destination chat IDs using /setsource and /setdest.";
const NO_CURSOR: &str = "No last message ID found. Forwarding has not been started or no messages have been forwarded yet.";
const MAX_LISTED_SKIPS: usize = 20;
// Longest entity `escape_html` emits: `&quot;`.
const ENTITY_MAX: usize = 6;

#[derive(Clone, Copy, Debug)]
enum RunKind {
    Forward,
    Resume,
}

async fn send_text(state: &AppState, chat_id: ChatId, text: &str) {
    send_html_split(state, chat_id, &escape_html(text)).await;
}

async fn send_html_split(state: &AppState, chat_id: ChatId, html: &str) {
    for chunk in split_lines(html, 4000) {
        let _ = state.messenger.send_html(chat_id, &chunk).await;
    }
}

/// Split on line boundaries so no chunk exceeds `limit` bytes.
///
/// Over-long lines are hard-cut, never inside an HTML entity such as `&amp;`.
fn split_lines(text: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let mut line = line;
        while line.len() > limit {
            let mut cut = limit;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            if let Some(amp) = line[..cut].rfind('&') {
                if amp > 0 && cut - amp < ENTITY_MAX && !line[amp..cut].contains(';') {
                    cut = amp;
                }
            }
            if !chunk.is_empty() {
                out.push(std::mem::take(&mut chunk));
            }
            out.push(line[..cut].to_string());
            line = &line[cut..];
        }
        if !chunk.is_empty() && chunk.len() + 1 + line.len() > limit {
            out.push(std::mem::take(&mut chunk));
        }
        if !chunk.is_empty() {
            chunk.push('\n');
        }
        chunk.push_str(line);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

pub async fn handle_command(chat_id: i64, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let chat = ChatId(chat_id);

    match Command::parse(text) {
        Command::Help => send_html_split(&state, chat, HELP).await,

        Command::Usage(usage) => send_text(&state, chat, usage).await,

        Command::Set(field) => match state.controller.configure(field).await {
            Ok(()) => send_text(&state, chat, &describe_field(&field)).await,
            Err(e) => send_text(&state, chat, &format!("❌ {e}")).await,
        },

        Command::ListChats => match state.controller.list_chats().await {
            Ok(chats) => send_text(&state, chat, &format_chat_list(&chats)).await,
            Err(e) => send_text(&state, chat, &format!("❌ {e}")).await,
        },

        Command::Forward => spawn_run(state, chat, RunKind::Forward).await,
        Command::Resume => spawn_run(state, chat, RunKind::Resume).await,

        Command::Stop => match state.controller.stop().await {
            Ok(_) => send_text(&state, chat, "Forwarding process has been stopped.").await,
            Err(e) => {
                warn!(error = %e, "stop could not save progress");
                send_text(
                    &state,
                    chat,
                    &format!("Forwarding process has been stopped, but progress was not saved: {e}"),
                )
                .await
            }
        },

        Command::Stats => {
            let snapshot = state.controller.status().await;
            send_text(&state, chat, &format_stats(&snapshot)).await
        }

        Command::Unknown(cmd) => send_text(&state, chat, &format!("Unknown command: /{cmd}")).await,
    }

    Ok(())
}

/// Runs can last hours; keep the dispatcher free so `/stop` and `/stats` get through.
async fn spawn_run(state: Arc<AppState>, chat: ChatId, kind: RunKind) {
    let runs = state.runs.clone();
    runs.spawn(async move {
        info!(?kind, chat = chat.0, "run requested");
        let res = match kind {
            RunKind::Forward => state.controller.start(chat, state.messenger.clone()).await,
            RunKind::Resume => state.controller.resume(chat, state.messenger.clone()).await,
        };
        let reply = match res {
            Ok(summary) => format_run_summary(&summary),
            Err(Error::Config(_)) => NEED_IDS.to_string(),
            Err(Error::NoCursor) => NO_CURSOR.to_string(),
            Err(Error::AlreadyRunning) => {
                "A forwarding job is already running. Use /stop first.".to_string()
            }
            Err(e) => format!("❌ {e}"),
        };
        send_text(&state, chat, &reply).await;
    })
    .await;
}

fn format_run_summary(s: &RunSummary) -> String {
    let mut lines = vec![match &s.outcome {
        RunOutcome::Completed => "✅ Forwarding complete.".to_string(),
        RunOutcome::Stopped => "⏹ Forwarding stopped.".to_string(),
        RunOutcome::Aborted(reason) => format!("⚠️ Forwarding aborted: {reason}"),
    }];

    lines.push(format!("Messages forwarded this run: {}", s.forwarded));
    if !s.skipped.is_empty() {
        let mut ids: Vec<String> = s
            .skipped
            .iter()
            .take(MAX_LISTED_SKIPS)
            .map(|id| id.to_string())
            .collect();
        if s.skipped.len() > MAX_LISTED_SKIPS {
            ids.push("...".to_string());
        }
        lines.push(format!(
            "Skipped (not delivered): {} [{}]",
            s.skipped.len(),
            ids.join(", ")
        ));
    }
    if s.rate_limit_waits > 0 {
        lines.push(format!("Rate-limit waits: {}", s.rate_limit_waits));
    }
    lines.push(format!(
        "Last forwarded message ID: {}",
        s.last_forwarded_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string())
    ));
    lines.push(format!("Duration: {}", format_duration(s.elapsed_seconds())));
    lines.push(format!("Total messages forwarded: {}", s.total_forwarded));
    if let Some(err) = &s.persist_error {
        lines.push(format!("⚠️ Progress not saved: {err}"));
    }
    lines.join("\n")
}

fn format_stats(s: &JobSnapshot) -> String {
    let opt = |v: Option<String>| v.unwrap_or_else(|| "not set".to_string());
    [
        format!("Total messages forwarded: {}", s.total_forwarded),
        format!("Status: {}", s.status.label()),
        format!(
            "Last forwarded message ID: {}",
            opt(s.last_forwarded_id.map(|id| id.to_string()))
        ),
        format!("Source: {}", opt(s.settings.source.map(|id| id.to_string()))),
        format!(
            "Destination: {}",
            opt(s.settings.destination.map(|id| id.to_string()))
        ),
        format!(
            "Start message ID: {}",
            opt(s.settings.start_cursor.map(|id| id.to_string()))
        ),
        format!("Batch size: {}", s.settings.batch_size),
        format!("Sleep time: {} seconds", s.settings.cooldown.as_secs()),
        format!(
            "Delay between messages: {} seconds",
            s.settings.inter_message_delay.as_secs()
        ),
    ]
    .join("\n")
}

fn format_chat_list(chats: &[ChatSummary]) -> String {
    if chats.is_empty() {
        return "No chats seen yet. Add the bot to a chat or channel and post a message there."
            .to_string();
    }
    let mut out = String::from("List of groups:\n");
    for c in chats {
        out.push_str(&format!("Chat ID: {}, Title: {}\n", c.id, c.title));
    }
    out
}
