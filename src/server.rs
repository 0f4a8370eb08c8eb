//! HTTP surface: a status page, a JSON export and the live-update websocket.

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{Html, Response},
    routing::get,
};
use chrono::{Local, SecondsFormat};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::{fmt::Write, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, select, sync::mpsc};

use crate::error::Error;
use crate::hub::{self, Subscriber};
use crate::model::Outcome;
use crate::store::ResultStore;

/// Inbound websocket messages are only read to notice a close.
const MAX_INBOUND_MESSAGE: usize = 512;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ResultStore>,
    pub subscribers: mpsc::Sender<Subscriber>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/json", get(export))
        .route("/ws", get(live))
        .with_state(state)
}

pub async fn serve(port: u16, state: AppState) -> Result<(), Error> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("Server listening on port {port}");
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<(), Error> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn export(State(state): State<AppState>) -> Json<Vec<Outcome>> {
    Json(state.store.snapshot())
}

async fn status_page(State(state): State<AppState>) -> Html<String> {
    let mut rows = String::new();
    for target in state.store.inventory().iter() {
        let Some(outcome) = state.store.get(&target.domain) else {
            continue;
        };
        let (class, label) = if outcome.ok { ("up", "UP") } else { ("down", "DOWN") };
        let _ = write!(
            rows,
            r#"<tr id="{id}" class="{class}"><td>{name}</td><td class="state">{label}</td><td class="checked">{checked}</td></tr>"#,
            id = escape(&outcome.domain),
            name = escape(target.display_name()),
            checked = escape(&outcome.last_check),
        );
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>downwatch</title>
<style>
  body {{ font-family: sans-serif; margin: 2em; }}
  td, th {{ padding: 0.3em 1em; text-align: left; }}
  .up .state {{ color: #2a7d2a; }}
  .down .state {{ color: #b52a2a; font-weight: bold; }}
</style>
</head>
<body>
<table>
<tr><th>Site</th><th>Status</th><th>Last check</th></tr>
{rows}
</table>
<footer>downwatch {version}, page generated at {page_time}</footer>
<script>
  const ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
  ws.onmessage = (event) => {{
    const result = JSON.parse(event.data);
    const row = document.getElementById(result.domain);
    if (!row) return;
    row.className = result.ok ? "up" : "down";
    row.querySelector(".state").textContent = result.ok ? "UP" : "DOWN";
    row.querySelector(".checked").textContent = result.last_check;
  }};
</script>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        page_time = Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    ))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn live(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_INBOUND_MESSAGE)
        .on_upgrade(move |socket| relay(socket, state.subscribers))
}

/// Forwards frames from the hub to the socket until either side goes away.
async fn relay(socket: WebSocket, subscribers: mpsc::Sender<Subscriber>) {
    let (subscriber, mut frames) = hub::subscriber();
    if subscribers.send(subscriber).await.is_err() {
        warn!("monitor is not running, refusing live connection");
        return;
    }

    let (mut sink, mut stream) = socket.split();
    loop {
        select! {
            frame = frames.recv() => {
                // None: the hub dropped us
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    info!("could not write to websocket: {e}");
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    info!("received websocket close request from client");
                    break;
                }
                Some(Err(e)) => {
                    info!("websocket read error: {e}");
                    break;
                }
                Some(Ok(_)) => debug!("ignoring inbound websocket message"),
            }
        }
    }

    let _ = sink.close().await;
}
