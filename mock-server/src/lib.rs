use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use url::form_urlencoded;
use uuid::Uuid;

pub const MODEL_TYPES: &[&str] = &["Checkpoint", "LORA", "TextualInversion", "Controlnet"];
pub const MAX_MODEL_LIMIT: usize = 100;
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
}

#[derive(Deserialize)]
pub struct CreateModel {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: u64,
    pub url: String,
    pub model_id: u64,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub models: BTreeMap<u64, Model>,
    pub images: Vec<Image>,
    next_id: u64,
}

impl Catalog {
    /// Six models across all types and 25 images.
    pub fn seeded() -> Self {
        let mut catalog = Catalog::default();
        let seeds = [
            ("Base Model XL", "Checkpoint"),
            ("Anime Lines", "LORA"),
            ("Watercolor", "LORA"),
            ("Bad Hands Fix", "TextualInversion"),
            ("Pose Guide", "Controlnet"),
            ("Film Grain", "LORA"),
        ];
        for (name, model_type) in seeds {
            catalog.insert(name.to_string(), model_type.to_string());
        }
        catalog.images = (1..=25)
            .map(|id| Image {
                id,
                url: format!("https://images.example.com/{id}.png"),
                model_id: (id % 6) + 1,
            })
            .collect();
        catalog
    }

    fn insert(&mut self, name: String, model_type: String) -> Model {
        self.next_id += 1;
        let model = Model {
            id: self.next_id,
            name,
            model_type,
        };
        self.models.insert(model.id, model.clone());
        model
    }
}

pub type Db = Arc<RwLock<Catalog>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Catalog::seeded()));
    Router::new()
        .route("/v1/models", get(list_models).post(create_model))
        .route("/v1/models/{id}", get(get_model).delete(delete_model))
        .route("/v1/images", get(list_images))
        .route("/v1/challenge", get(challenge))
        .route("/v1/limited", get(limited))
        .route("/v1/slow", get(slow))
        .route("/v1/nothing", get(nothing))
        .route("/v1/garbled", get(garbled))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Decode `a=1&b=2&b=3` into ordered pairs, keeping repeated keys.
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}

fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn all<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

/// JSON error body in the API's validation format, tagged with a trace id.
fn error_response(status: StatusCode, message: &str, errors: Option<serde_json::Value>) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let mut body = json!({ "message": message, "traceId": trace_id });
    if let Some(errors) = errors {
        body["errors"] = errors;
    }
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        headers.insert("x-trace-id", value);
    }
    (status, headers, Json(body)).into_response()
}

fn parse_limit(pairs: &[(String, String)], default: usize, max: usize) -> Result<usize, Response> {
    match first(pairs, "limit") {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if (1..=max).contains(&limit) => Ok(limit),
            _ => Err(error_response(
                StatusCode::BAD_REQUEST,
                "invalid limit",
                Some(json!({ "limit": [format!("must be between 1 and {max}")] })),
            )),
        },
    }
}

/// Cursor-paged listing. The cursor is the offset of the next item; no body
/// metadata is returned, only `X-Next-Cursor`.
async fn list_models(State(db): State<Db>, RawQuery(raw): RawQuery) -> Response {
    let pairs = parse_query(raw.as_deref());
    debug!(?pairs, "list models");

    let limit = match parse_limit(&pairs, 20, MAX_MODEL_LIMIT) {
        Ok(limit) => limit,
        Err(response) => return response,
    };
    let offset = match first(&pairs, "cursor").map(str::parse::<usize>) {
        None => 0,
        Some(Ok(offset)) => offset,
        Some(Err(_)) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid cursor",
                Some(json!({ "cursor": ["unrecognised cursor"] })),
            )
        }
    };

    let types = all(&pairs, "types");
    if types.iter().any(|t| t.contains(',')) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid query",
            Some(json!({ "types": ["comma-separated values are not accepted; repeat the parameter"] })),
        );
    }
    let query = first(&pairs, "query").map(str::to_lowercase);
    let newest_first = first(&pairs, "sort") == Some("Newest");

    let catalog = db.read().await;
    let mut matches: Vec<&Model> = catalog
        .models
        .values()
        .filter(|m| types.is_empty() || types.contains(&m.model_type.as_str()))
        .filter(|m| {
            query
                .as_deref()
                .map_or(true, |q| m.name.to_lowercase().contains(q))
        })
        .collect();
    if newest_first {
        matches.reverse();
    }

    let page: Vec<Model> = matches.iter().skip(offset).take(limit).map(|m| (*m).clone()).collect();
    let mut headers = HeaderMap::new();
    let next = offset + page.len();
    if next < matches.len() {
        headers.insert("x-next-cursor", HeaderValue::from(next));
    }
    (StatusCode::OK, headers, Json(json!({ "items": page }))).into_response()
}

async fn get_model(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let catalog = db.read().await;
    match catalog.models.get(&id) {
        Some(model) => Json(model.clone()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, &format!("model {id} not found"), None),
    }
}

async fn create_model(State(db): State<Db>, Json(input): Json<CreateModel>) -> Response {
    if !MODEL_TYPES.contains(&input.model_type.as_str()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid model",
            Some(json!({ "type": [format!("unknown model type {}", input.model_type)] })),
        );
    }
    let model = db.write().await.insert(input.name, input.model_type);
    (StatusCode::CREATED, Json(model)).into_response()
}

async fn delete_model(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    match db.write().await.models.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(StatusCode::NOT_FOUND, &format!("model {id} not found"), None),
    }
}

/// Page-index listing with full body metadata.
async fn list_images(State(db): State<Db>, RawQuery(raw): RawQuery) -> Response {
    let pairs = parse_query(raw.as_deref());
    let limit = match parse_limit(&pairs, 10, 200) {
        Ok(limit) => limit,
        Err(response) => return response,
    };
    let page = first(&pairs, "page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1);

    let catalog = db.read().await;
    let total = catalog.images.len();
    let total_pages = total.div_ceil(limit);
    let items: Vec<Image> = catalog
        .images
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();
    Json(json!({
        "items": items,
        "metadata": {
            "totalItems": total,
            "currentPage": page,
            "pageSize": limit,
            "totalPages": total_pages,
        }
    }))
    .into_response()
}

/// What an edge proxy serves instead of the API: HTML with a 200.
async fn challenge() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html><html><head><title>Just a moment...</title></head>\
         <body><div id=\"cf-browser-verification\">Checking your browser before accessing the site.</div>\
         <script src=\"/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1\"></script></body></html>",
    )
}

async fn limited() -> Response {
    let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded", None);
    response
        .headers_mut()
        .insert("retry-after", HeaderValue::from_static("7"));
    response
}

async fn slow() -> Json<serde_json::Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({ "items": [] }))
}

async fn nothing() -> Json<serde_json::Value> {
    Json(serde_json::Value::Null)
}

/// A JSON list whose body is not valid UTF-8.
async fn garbled() -> Response {
    (
        [(CONTENT_TYPE, "application/json")],
        b"{\"items\":[{\"id\":1,\"name\":\"\xff\"}]}".to_vec(),
    )
        .into_response()
}
