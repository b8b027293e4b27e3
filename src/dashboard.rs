use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

use crate::config::DashboardConfig;
use crate::session::{Command, SessionHandle};
use crate::settings::DiscoveryMode;

fn to_json<T: Serialize>(value: T) -> Result<Json<serde_json::Value>, StatusCode> {
    serde_json::to_value(value).map(Json).map_err(|e| {
        log::error!("JSON serialization error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[derive(Clone)]
struct AppState {
    session: SessionHandle,
}

#[derive(Deserialize)]
struct ChannelBody {
    name: String,
}

#[derive(Deserialize)]
struct MessageBody {
    text: String,
}

#[derive(Deserialize)]
struct DiscoveryModeBody {
    mode: i64,
}

#[derive(Deserialize)]
struct StoreNodeBody {
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapNodeBody {
    address: String,
    #[serde(default)]
    mix_pub_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MixKeyBody {
    mix_pub_key: String,
}

pub struct Dashboard {
    config: DashboardConfig,
    session: SessionHandle,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, session: SessionHandle) -> Self {
        Self { config, session }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let bind = self.config.bind_address.clone();
        log::info!("Starting dashboard on {}", bind);

        let app = router(self.session);

        let listener = tokio::net::TcpListener::bind(&bind).await?;
        log::info!("Dashboard listening on {}", bind);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn router(session: SessionHandle) -> Router {
    let state = AppState { session };

    Router::new()
        .route("/api/state", get(handle_state))
        .route("/api/events", get(handle_sse))
        .route("/api/channel", post(handle_join_channel))
        .route(
            "/api/messages",
            post(handle_send_message).delete(handle_clear_messages),
        )
        .route("/api/history", post(handle_retrieve_history))
        .route("/api/settings/discovery-mode", put(handle_discovery_mode))
        .route("/api/settings/store-node", put(handle_store_node))
        .route(
            "/api/settings/bootstrap-nodes",
            post(handle_add_bootstrap_node),
        )
        .route(
            "/api/settings/bootstrap-nodes/{index}",
            put(handle_update_mix_key).delete(handle_remove_bootstrap_node),
        )
        .route("/api/settings/save", post(handle_save_settings))
        .route("/api/peer-id/reset", post(handle_reset_peer_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Queue `command` and answer right away; the outcome shows up in
/// `/api/state` and `/api/events`.
async fn accept(state: &AppState, command: Command) -> StatusCode {
    if state.session.send(command).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn handle_state(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let view = state
        .session
        .snapshot()
        .await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    to_json(view)
}

async fn handle_join_channel(
    State(state): State<AppState>,
    Json(body): Json<ChannelBody>,
) -> StatusCode {
    accept(&state, Command::JoinChannel(body.name)).await
}

async fn handle_send_message(
    State(state): State<AppState>,
    Json(body): Json<MessageBody>,
) -> StatusCode {
    accept(&state, Command::SendMessage(body.text)).await
}

async fn handle_clear_messages(State(state): State<AppState>) -> StatusCode {
    accept(&state, Command::ClearMessages).await
}

async fn handle_retrieve_history(State(state): State<AppState>) -> StatusCode {
    accept(&state, Command::RetrieveHistory).await
}

async fn handle_discovery_mode(
    State(state): State<AppState>,
    Json(body): Json<DiscoveryModeBody>,
) -> StatusCode {
    match DiscoveryMode::from_int(body.mode) {
        Some(mode) => accept(&state, Command::SetDiscoveryMode(mode)).await,
        None => {
            log::warn!("Rejected unknown discovery mode {}", body.mode);
            StatusCode::BAD_REQUEST
        }
    }
}

async fn handle_store_node(
    State(state): State<AppState>,
    Json(body): Json<StoreNodeBody>,
) -> StatusCode {
    accept(&state, Command::SetStoreNode(body.address)).await
}

async fn handle_add_bootstrap_node(
    State(state): State<AppState>,
    Json(body): Json<BootstrapNodeBody>,
) -> StatusCode {
    accept(
        &state,
        Command::AddBootstrapNode {
            address: body.address,
            mix_pub_key: body.mix_pub_key,
        },
    )
    .await
}

async fn handle_update_mix_key(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(body): Json<MixKeyBody>,
) -> StatusCode {
    accept(
        &state,
        Command::UpdateBootstrapMixKey {
            index,
            mix_pub_key: body.mix_pub_key,
        },
    )
    .await
}

async fn handle_remove_bootstrap_node(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> StatusCode {
    accept(&state, Command::RemoveBootstrapNode(index)).await
}

async fn handle_save_settings(State(state): State<AppState>) -> StatusCode {
    accept(&state, Command::SaveSettings).await
}

async fn handle_reset_peer_id(State(state): State<AppState>) -> StatusCode {
    accept(&state, Command::ResetPeerId).await
}

async fn handle_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe();
    // A lagging client missed some changes; tell it to re-read everything.
    let stream = BroadcastStream::new(rx).map(|change| {
        let name = change.map(|c| c.name()).unwrap_or("resync");
        Ok(Event::default().event(name).data(""))
    });
    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(std::time::Duration::from_secs(30))
            .text("ping"),
    )
}
