//! Plain-text rendering of lists, threads and the dashboard.

use std::fmt::Write;

use blockflow_client::{Dashboard, Story};
use blockflow_core::{Block, BlockflowError, Flow, Message, PendingFlow, ResourceKind};
use blockflow_state::ListView;

pub const WAITING_LINE: &str = "Waiting for additional input...";
pub const WAITING_BADGE: &str = "[waiting for input]";
pub const DASHBOARD_FAILED: &str = "Failed to fetch data";
pub const NO_SELECTION: &str = "No flow selected";

pub fn error(err: &BlockflowError) -> String {
    error_message(&err.user_message())
}

pub fn error_message(message: &str) -> String {
    format!("Error: {message}")
}

/// Header shared by both lists: loading, error, or a count with a freshness marker.
fn list_header<T>(kind: ResourceKind, view: &ListView<T>) -> Result<String, String> {
    if !view.loaded {
        return Err(match &view.error {
            Some(e) if !view.is_loading => error(e),
            _ => format!("Loading {kind}..."),
        });
    }

    let mut header = format!("{kind} ({})", view.items.len());
    if view.is_loading {
        header.push_str(" refreshing...");
    } else if view.is_stale {
        header.push_str(" (stale)");
    }
    if let Some(e) = &view.error {
        let _ = write!(header, " [last refresh failed: {}]", e.user_message());
    }
    Ok(header)
}

pub fn blocks(view: &ListView<Block>) -> String {
    let mut out = match list_header(ResourceKind::Blocks, view) {
        Ok(header) => header,
        Err(line) => return line,
    };
    if view.items.is_empty() {
        out.push_str("\n  (none)");
    }
    for block in &view.items {
        let _ = write!(
            out,
            "\n  {}  {}  {}  [{}]",
            block.id,
            block.name,
            block.url,
            block.action_names().join(", ")
        );
    }
    out
}

pub fn flows(view: &ListView<Flow>) -> String {
    let mut out = match list_header(ResourceKind::Flows, view) {
        Ok(header) => header,
        Err(line) => return line,
    };
    if view.items.is_empty() {
        out.push_str("\n  (none)");
    }
    for flow in &view.items {
        let _ = write!(out, "\n  {}  {}", flow.id, flow.name);
        if flow.is_pending() {
            let _ = write!(out, "  {WAITING_BADGE}");
        }
    }
    out
}

pub fn message(message: &Message) -> String {
    format!("{}: {}", message.role.label(), message.content)
}

/// The selected flow: header, every message, and the waiting line when pending.
pub fn thread(flow: &Flow) -> String {
    let mut out = format!("== {} ({}) [{}] ==", flow.name, flow.id, flow.status);
    if !flow.description.is_empty() {
        let _ = write!(out, "\n{}", flow.description);
    }
    for m in flow.messages.iter() {
        let _ = write!(out, "\n{}", message(m));
    }
    if flow.is_pending() {
        let _ = write!(out, "\n{WAITING_LINE}");
    }
    out
}

/// Shown when an already-displayed flow changes status.
pub fn status_change(flow: &Flow) -> String {
    if flow.is_pending() {
        WAITING_LINE.to_string()
    } else {
        format!("Flow {} is now {}", flow.name, flow.status)
    }
}

pub fn pending(flows: &[PendingFlow]) -> String {
    if flows.is_empty() {
        return "No flows waiting for input".to_string();
    }
    let mut out = format!("Waiting for input ({})", flows.len());
    for flow in flows {
        let _ = write!(out, "\n  {}", flow.flow_id);
        if !flow.missing_inputs.is_null() {
            let _ = write!(out, "  needs {}", flow.missing_inputs);
        }
    }
    out
}

fn story(story: &Story) -> String {
    let mut line = format!("{} ({} points by {})", story.title, story.score, story.by);
    if let Some(url) = &story.url {
        let _ = write!(line, "\n     {url}");
    }
    line
}

pub fn dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::from("Top stories");
    for (rank, s) in dashboard.stories.iter().enumerate() {
        let _ = write!(out, "\n  {}. {}", rank + 1, story(s));
    }
    let quote = &dashboard.quote;
    let _ = write!(
        out,
        "\n{}  {:.2}  {}  (updated {})",
        quote.symbol,
        quote.price,
        quote.change_label(),
        quote.fetched_at.format("%H:%M:%S UTC")
    );
    out
}
