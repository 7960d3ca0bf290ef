//! HTML front-end for the cluster.
//!
//! Renders the item list with add/edit/delete forms and forwards every
//! mutation to the current leader over the framed TCP protocol. A background
//! task re-probes the leader every few seconds and rescans the node list
//! when it stops answering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::transport::wire::{Request, ResponseCode};
use crate::transport::{TcpTransport, Transport};

/// Shared state of the web tier.
pub struct WebState {
    /// All replication node addresses, in scan order.
    nodes: Vec<String>,
    /// The node currently believed to be the leader.
    leader: RwLock<String>,
    client: TcpTransport,
    probe_interval: Duration,
}

impl WebState {
    pub fn new(nodes: Vec<String>, client: TcpTransport, probe_interval: Duration) -> Self {
        let leader = RwLock::new(nodes.first().cloned().unwrap_or_default());
        WebState {
            nodes,
            leader,
            client,
            probe_interval,
        }
    }

    pub async fn leader_addr(&self) -> String {
        self.leader.read().await.clone()
    }
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/add", post(add_item))
        .route("/edit", post(edit_item))
        .route("/delete", post(delete_item))
        .with_state(state)
}

/// Probe the believed leader once; on failure scan the node list in order
/// and adopt the first node that claims leadership. Returns whether a
/// leader is currently known to answer.
pub async fn probe_once(state: &WebState) -> bool {
    let current = state.leader_addr().await;
    if !current.is_empty() {
        if let Ok(ResponseCode::Accept) = state.client.call(&current, Request::leader_probe()).await
        {
            return true;
        }
        warn!(leader = %current, "leader stopped answering, rescanning");
    }
    for addr in &state.nodes {
        if let Ok(ResponseCode::Accept) = state.client.call(addr, Request::leader_probe()).await {
            info!(leader = %addr, "adopted leader");
            *state.leader.write().await = addr.clone();
            return true;
        }
    }
    false
}

/// Background leader-probe loop.
pub async fn run_leader_probe(state: Arc<WebState>) {
    loop {
        probe_once(&state).await;
        tokio::time::sleep(state.probe_interval).await;
    }
}

#[derive(Debug, Deserialize)]
struct AddForm {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct EditForm {
    old_key: String,
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct DeleteForm {
    key: String,
}

async fn index(State(state): State<Arc<WebState>>) -> Html<String> {
    let leader = state.leader_addr().await;
    match state.client.fetch_items(&leader).await {
        Ok(items) => Html(render_index(&items)),
        Err(err) => {
            warn!(%err, leader = %leader, "failed to fetch items");
            Html(result_page(
                "Store unavailable",
                "No leader is answering right now. Try again shortly.",
            ))
        }
    }
}

async fn add_item(
    State(state): State<Arc<WebState>>,
    Form(form): Form<AddForm>,
) -> Html<String> {
    if forward(&state, Request::add(form.key, form.value)).await {
        Html(result_page("Add complete", "The item was stored on a majority of nodes."))
    } else {
        Html(result_page(
            "Add failed",
            "The item name is empty, already taken, or the cluster has no quorum.",
        ))
    }
}

async fn edit_item(
    State(state): State<Arc<WebState>>,
    Form(form): Form<EditForm>,
) -> Html<String> {
    if forward(&state, Request::update(form.old_key, form.key, form.value)).await {
        Html(result_page("Edit complete", "The item was updated on a majority of nodes."))
    } else {
        Html(result_page(
            "Edit failed",
            "The new name is empty, taken by another item, or the cluster has no quorum.",
        ))
    }
}

async fn delete_item(
    State(state): State<Arc<WebState>>,
    Form(form): Form<DeleteForm>,
) -> Html<String> {
    if forward(&state, Request::delete(form.key)).await {
        Html(result_page("Delete complete", "The item was removed."))
    } else {
        Html(result_page("Delete failed", "No such item, or the cluster has no quorum."))
    }
}

/// Send one mutation to the believed leader.
async fn forward(state: &WebState, request: Request) -> bool {
    let leader = state.leader_addr().await;
    match state.client.call(&leader, request).await {
        Ok(ResponseCode::Accept) => true,
        Ok(_) => false,
        Err(err) => {
            warn!(%err, leader = %leader, "mutation forwarding failed");
            false
        }
    }
}

fn render_index(items: &HashMap<String, String>) -> String {
    let mut page = String::from(concat!(
        "<!doctype html><html><head><title>Items</title></head><body>",
        "<h1>List of items</h1>",
        "<form action='/add' method='post'>",
        "<input type='text' name='key' placeholder='Name of item'>",
        "<input type='text' name='value' placeholder='Description of item'>",
        "<input type='submit' value='Add'></form>",
    ));

    // Stable order so reloads don't shuffle the list.
    let mut keys: Vec<&String> = items.keys().collect();
    keys.sort();
    for key in keys {
        let value = &items[key];
        page.push_str(&format!(
            concat!(
                "<form method='post'>",
                "<input type='hidden' name='old_key' value='{k}'>",
                "<input type='text' name='key' value='{k}'>",
                "<input type='text' name='value' value='{v}'>",
                "<input type='submit' formaction='/edit' value='Edit'>",
                "<input type='submit' formaction='/delete' value='Delete'>",
                "</form>",
            ),
            k = escape(key),
            v = escape(value),
        ));
    }
    page.push_str("</body></html>");
    page
}

fn result_page(title: &str, detail: &str) -> String {
    format!(
        concat!(
            "<!doctype html><html><head><title>{t}</title></head><body>",
            "<h1>{t}</h1><p>{d}</p>",
            "<a href='/'>Return to main page</a>",
            "</body></html>",
        ),
        t = escape(title),
        d = escape(detail),
    )
}

/// Minimal HTML attribute/text escaping.
fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}
