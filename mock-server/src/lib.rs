use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
}

/// JSON body sent with 4xx responses that carry one.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiProblem {
    pub code: String,
    pub message: String,
}

/// One received multipart field.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ReceivedPart {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub parts: Vec<ReceivedPart>,
}

#[derive(Debug, Default)]
pub struct Store {
    token: Option<String>,
    items: HashMap<u32, Item>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let mut store = Store::default();
    store.items.insert(
        1,
        Item {
            id: 1,
            name: "widget".to_string(),
        },
    );

    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/token", post(mint_token))
        .route("/profile", get(get_profile))
        .route("/items/{id}", get(get_item).delete(delete_item))
        .route("/echo", post(echo))
        .route("/uploads", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Mint a new token; earlier tokens stop being accepted.
async fn mint_token(State(db): State<Db>) -> Json<Token> {
    let token = Uuid::new_v4().to_string();
    db.write().await.token = Some(token.clone());
    Json(Token { token })
}

/// Requires `Authorization: Bearer <token>` with the latest minted token.
async fn get_profile(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Profile>, StatusCode> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let store = db.read().await;
    match (presented, store.token.as_deref()) {
        (Some(presented), Some(current)) if presented == current => Ok(Json(Profile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        })),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn not_found(id: u32) -> Response {
    let problem = ApiProblem {
        code: "not_found".to_string(),
        message: format!("no item {id}"),
    };
    (StatusCode::NOT_FOUND, Json(problem)).into_response()
}

async fn get_item(State(db): State<Db>, Path(id): Path<u32>) -> Response {
    let store = db.read().await;
    match store.items.get(&id) {
        Some(item) => Json(item.clone()).into_response(),
        None => not_found(id),
    }
}

async fn delete_item(State(db): State<Db>, Path(id): Path<u32>) -> StatusCode {
    match db.write().await.items.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn echo(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(body)
}

async fn upload(mut multipart: Multipart) -> Result<Json<UploadReport>, Response> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(IntoResponse::into_response)?;
        parts.push(ReceivedPart {
            name,
            filename,
            content_type,
            size: data.len(),
        });
    }
    Ok(Json(UploadReport { parts }))
}
