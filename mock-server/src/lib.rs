use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Largest body `/bytes/{len}` will produce.
pub const MAX_BYTES: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub price_cents: u32,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    pub price_cents: u32,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

fn seed() -> HashMap<Uuid, Item> {
    [("desk", 8999), ("lamp", 1299)]
        .into_iter()
        .map(|(name, price_cents)| {
            let item = Item {
                id: Uuid::new_v4(),
                name: name.to_string(),
                price_cents,
            };
            (item.id, item)
        })
        .collect()
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(seed()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item))
        .route("/echo", post(echo))
        .route("/headers", get(headers))
        .route("/status/{code}", get(status))
        .route("/bytes/{len}", get(bytes))
        .route("/empty", get(empty))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    let mut items: Vec<Item> = items.values().cloned().collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Json(items)
}

async fn create_item(
    State(db): State<Db>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        price_cents: input.price_cents,
    };
    tracing::debug!(id = %item.id, "created item");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, StatusCode> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Sends the request body back untouched.
async fn echo(body: Bytes) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], body)
}

/// Request headers as a JSON object keyed by lower-cased name.
async fn headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    )
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(serde_json::json!({ "status": code }))))
}

async fn bytes(Path(len): Path<usize>) -> Result<impl IntoResponse, StatusCode> {
    if len > MAX_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    let body: Vec<u8> = (0..len).map(|i| i as u8).collect();
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], body))
}

async fn empty() -> StatusCode {
    StatusCode::OK
}
