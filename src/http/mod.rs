use std::{collections::BTreeMap, path::Path as FsPath, sync::Arc};

use axum::{
    Json, Router,
    extract::{Extension, FromRequest, Path, Query, Request, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::{
    domain::{
        DomainError, Order, OrderItem, OrderStatus, TableMapping, validate_table_number,
    },
    frontend_url::FrontendUrl,
    orders::{NewOrder, OrderFilter, OrderStore},
    qr::{self, ALL_QR_ZIP_FILE_NAME, QrError, QrInfo, qr_png_file_name},
    state::StoreError,
    tables::TableRegistry,
};

pub const API_PREFIX: &str = "/api/qr-menu";

#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<Mutex<TableRegistry>>,
    pub orders: Arc<Mutex<OrderStore>>,
    pub frontend_url: Arc<FrontendUrl>,
}

impl AppState {
    pub fn open(data_dir: &FsPath, frontend_url: FrontendUrl) -> Result<Self, StoreError> {
        Ok(Self {
            tables: Arc::new(Mutex::new(TableRegistry::open(data_dir)?)),
            orders: Arc::new(Mutex::new(OrderStore::open(data_dir)?)),
            frontend_url: Arc::new(frontend_url),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    details: Map<String, Value>,
}

impl ApiError {
    fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            details: Map::new(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::invalid_request(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(domain) => domain.into(),
            StoreError::Io(_) | StoreError::SerdeJson(_) => {
                warn!(error = %value, "storage failure");
                ApiError::internal(value.to_string())
            }
        }
    }
}

impl From<QrError> for ApiError {
    fn from(value: QrError) -> Self {
        warn!(error = %value, "qr code generation failed");
        ApiError::internal(value.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: Map<String, Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S>,
    <axum::Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Serialize)]
struct TablesResponse {
    tables: Vec<TableMapping>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ConfigureTablesRequest {
    total_tables: i64,
}

#[derive(Debug, Serialize)]
struct ConfigureTablesResponse {
    message: String,
    total_tables: usize,
    tables: Vec<TableMapping>,
}

#[derive(Debug, Deserialize)]
struct BulkTablesRequest {
    mappings: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
struct BulkTablesResponse {
    message: String,
    total_tables: usize,
    mappings: BTreeMap<String, u32>,
}

#[derive(Debug, Serialize)]
struct QrInfoResponse {
    frontend_url: String,
    tables: Vec<QrInfo>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    table_number: i64,
    items: Vec<OrderItem>,
    total: i64,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateOrderResponse {
    order_id: String,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    table: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PatchOrderRequest {
    status: String,
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let admin = Router::new()
        .route("/tables", get(admin_list_tables))
        .route("/tables/configure", post(admin_configure_tables))
        .route("/tables/bulk", post(admin_replace_tables))
        .route("/qr-code/:table_number", get(admin_get_qr_code))
        .route("/qr-codes/all", get(admin_get_all_qr_codes))
        .route("/qr-codes/info", get(admin_get_qr_codes_info));

    let api = Router::new()
        .route("/health", get(health))
        .route("/table/:token", get(get_table_number))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:order_id", get(get_order).patch(patch_order))
        .nest("/admin", admin)
        .fallback(fallback_not_found);

    Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, api)
        .layer(Extension(state))
        .layer(cors_layer(cors_origins))
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid cors origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "QR Menu API",
        "version": crate::version::VERSION,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn fallback_not_found() -> ApiError {
    ApiError::not_found("not found")
}

async fn get_table_number(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let table_number = state
        .tables
        .lock()
        .await
        .lookup(&token)?
        .ok_or_else(|| ApiError::not_found("invalid token"))?;
    Ok(Json(json!({ "table_number": table_number })))
}

async fn admin_list_tables(
    Extension(state): Extension<AppState>,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = state.tables.lock().await.list_all()?;
    Ok(Json(TablesResponse {
        total: tables.len(),
        tables,
    }))
}

async fn admin_configure_tables(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<ConfigureTablesRequest>,
) -> Result<Json<ConfigureTablesResponse>, ApiError> {
    let tables = state.tables.lock().await.configure(req.total_tables)?;
    Ok(Json(ConfigureTablesResponse {
        message: format!("Successfully configured {} table(s)", tables.len()),
        total_tables: tables.len(),
        tables,
    }))
}

async fn admin_replace_tables(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<BulkTablesRequest>,
) -> Result<Json<BulkTablesResponse>, ApiError> {
    let mappings = req
        .mappings
        .into_iter()
        .map(|(token, table_number)| {
            Ok(TableMapping {
                token,
                table_number: validate_table_number(table_number)?,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    let tables = state.tables.lock().await.replace_all(mappings)?;
    Ok(Json(BulkTablesResponse {
        message: "Table mappings updated successfully".to_string(),
        total_tables: tables.len(),
        mappings: tables
            .into_iter()
            .map(|m| (m.token, m.table_number))
            .collect(),
    }))
}

async fn admin_get_qr_code(
    Extension(state): Extension<AppState>,
    Path(table_number): Path<String>,
) -> Result<Response, ApiError> {
    let table_number: u32 = table_number
        .parse()
        .map_err(|_| ApiError::invalid_request(format!("invalid table number: {table_number}")))?;

    let token = state
        .tables
        .lock()
        .await
        .token_for_table(table_number)?
        .ok_or_else(|| {
            ApiError::not_found(format!("table {table_number} not found"))
                .with_detail("table_number", table_number)
        })?;

    let url = qr::build_url(&state.frontend_url.resolve().await, &token);
    let png = tokio::task::spawn_blocking(move || qr::render(&url))
        .await
        .map_err(|e| ApiError::internal(format!("qr rendering task failed: {e}")))??;
    attachment("image/png", &qr_png_file_name(table_number), png)
}

async fn admin_get_all_qr_codes(
    Extension(state): Extension<AppState>,
) -> Result<Response, ApiError> {
    let tables = state.tables.lock().await.list_all()?;
    let base = state.frontend_url.resolve().await;

    let zip = tokio::task::spawn_blocking(move || qr::render_all(&tables, &base))
        .await
        .map_err(|e| ApiError::internal(format!("qr rendering task failed: {e}")))??;
    attachment("application/zip", ALL_QR_ZIP_FILE_NAME, zip)
}

async fn admin_get_qr_codes_info(
    Extension(state): Extension<AppState>,
) -> Result<Json<QrInfoResponse>, ApiError> {
    let tables = state.tables.lock().await.list_all()?;
    let frontend_url = state.frontend_url.resolve().await;
    let tables = qr::info(&tables, &frontend_url);
    Ok(Json(QrInfoResponse {
        frontend_url,
        total: tables.len(),
        tables,
    }))
}

async fn create_order(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let status = req.status.as_deref().map(OrderStatus::parse).transpose()?;
    let order = state.orders.lock().await.create(NewOrder {
        table_number: req.table_number,
        items: req.items,
        total: req.total,
        timestamp: req.timestamp,
        status,
    })?;
    Ok(Json(CreateOrderResponse {
        order_id: order.order_id,
        message: "Order saved successfully",
    }))
}

async fn list_orders(
    Extension(state): Extension<AppState>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    // `?table=&status=` is the same as no filter at all.
    let table = query.table.as_deref().filter(|s| !s.is_empty());
    let status = query.status.as_deref().filter(|s| !s.is_empty());
    let table_number = table
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| ApiError::invalid_request(format!("invalid table number: {raw}")))
                .and_then(|n| validate_table_number(n).map_err(ApiError::from))
        })
        .transpose()?;
    let filter = OrderFilter {
        table_number,
        status: status.map(OrderStatus::parse).transpose()?,
    };
    let orders = state.orders.lock().await.list(&filter)?;
    Ok(Json(orders))
}

async fn get_order(
    Extension(state): Extension<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .lock()
        .await
        .get(&order_id)?
        .ok_or_else(|| ApiError::not_found(format!("order not found: {order_id}")))?;
    Ok(Json(order))
}

async fn patch_order(
    Extension(state): Extension<AppState>,
    Path(order_id): Path<String>,
    ApiJson(req): ApiJson<PatchOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let status = OrderStatus::parse(&req.status)?;
    let order = state
        .orders
        .lock()
        .await
        .update_status(&order_id, status)?
        .ok_or_else(|| ApiError::not_found(format!("order not found: {order_id}")))?;
    Ok(Json(order))
}

fn attachment(
    content_type: &'static str,
    file_name: &str,
    body: Vec<u8>,
) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={file_name}"))
        .map_err(|e| ApiError::internal(format!("invalid attachment name: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok((headers, body).into_response())
}
