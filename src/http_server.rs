use crate::error::ApiError;
use crate::gateway::{path_join, IngestGateway, ManagementGateway, ServerStatus, WEBHOOK_PATH_PREFIX};
use crate::types::{
    CollectEndpointResponse, ConfigureEndpointRequest, CreateEndpointRequest,
    CreateEndpointResponse, Notification, NotificationHeader,
};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use std::fmt::Write as _;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

// GET -> text/plain server status
pub const URI_MANAGE_SERVER: &str = "/manage";
// POST CreateEndpointRequest (optional) -> CreateEndpointResponse
pub const URI_MANAGE_ENDPOINT_LIST: &str = "/manage/endpoint";
// GET -> CollectEndpointResponse, PUT ConfigureEndpointRequest, DELETE
pub const URI_MANAGE_ENDPOINT: &str = "/manage/endpoint/{endpoint_id}";

#[derive(Clone)]
pub struct ServerState {
    pub management: ManagementGateway,
    pub ingest: IngestGateway,
}

/// Builds the router with every route prefixed by `mount_point`.
pub fn router(state: ServerState, mount_point: &str) -> Router {
    let webhook_route = format!("{WEBHOOK_PATH_PREFIX}/{{endpoint_id}}");
    let routes = Router::new()
        .route(URI_MANAGE_SERVER, get(get_manage_server))
        .route(URI_MANAGE_ENDPOINT_LIST, post(post_manage_endpoint_list))
        .route(
            URI_MANAGE_ENDPOINT,
            get(get_manage_endpoint)
                .put(put_manage_endpoint)
                .delete(delete_manage_endpoint),
        )
        .route(&webhook_route, any(handle_webhook))
        .with_state(state);

    let mount = path_join(&["/", mount_point]);
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        routes
    } else {
        Router::new().nest(mount, routes)
    }
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn get_manage_server(State(state): State<ServerState>) -> impl IntoResponse {
    let status = state.management.status().await;
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_status(&status),
    )
}

async fn post_manage_endpoint_list(
    State(state): State<ServerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateEndpointRequest::default()
    } else {
        serde_json::from_slice::<CreateEndpointRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid CreateEndpointRequest: {e}")))?
    };
    info!(
        test_id = request.test_id.as_deref().unwrap_or("-"),
        remote = %remote.ip(),
        "creating endpoint"
    );

    let created = state.management.create().await?;
    let response = CreateEndpointResponse {
        endpoint_id: created.endpoint_id.to_string(),
        fully_qualified_endpoint: created.callback_url,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn get_manage_endpoint(
    Path(endpoint_id): Path<String>,
    State(state): State<ServerState>,
) -> Result<Json<CollectEndpointResponse>, ApiError> {
    let collected = state.management.collect(&endpoint_id).await?;
    Ok(Json(CollectEndpointResponse {
        notifications: collected.into_iter().map(Into::into).collect(),
    }))
}

async fn put_manage_endpoint(
    Path(endpoint_id): Path<String>,
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: ConfigureEndpointRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid ConfigureEndpointRequest: {e}")))?;
    state
        .management
        .configure(&endpoint_id, request.enabled)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_manage_endpoint(
    Path(endpoint_id): Path<String>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ApiError> {
    state.management.delete(&endpoint_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts any method. Answers 200 whether or not the endpoint exists or is enabled.
async fn handle_webhook(
    Path(endpoint_id): Path<String>,
    State(state): State<ServerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    debug!(
        endpoint_id,
        %method,
        bytes = body.len(),
        remote = %remote.ip(),
        "received notification"
    );

    let notification = Notification {
        received_at: state.ingest.now(),
        method: method.to_string(),
        headers: collect_headers(&headers),
        remote: Some(remote.ip().to_string()),
        body: body.to_vec(),
    };
    state.ingest.deliver(&endpoint_id, notification).await;

    StatusCode::OK
}

fn collect_headers(headers: &HeaderMap) -> Vec<NotificationHeader> {
    headers
        .iter()
        .map(|(name, value)| NotificationHeader {
            name: name.to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

// Aggregates only; endpoint ids double as management credentials.
fn render_status(status: &ServerStatus) -> String {
    let uptime = (status.now - status.started_at).num_seconds().max(0);
    let disabled = status.endpoints.iter().filter(|e| !e.enabled).count();
    let oldest = status
        .endpoints
        .iter()
        .map(|e| e.created_at)
        .min()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    let limits = &status.limits;

    let mut out = String::new();
    let _ = writeln!(out, "started_at: {}", status.started_at.to_rfc3339());
    let _ = writeln!(out, "uptime_seconds: {uptime}");
    let _ = writeln!(
        out,
        "active_endpoints: {} / {}",
        status.registry.active_endpoints, limits.max_active_endpoints
    );
    let _ = writeln!(out, "disabled_endpoints: {disabled}");
    let _ = writeln!(out, "oldest_endpoint_created_at: {oldest}");
    let _ = writeln!(
        out,
        "uncollected_notifications: {}",
        status.registry.uncollected_notifications
    );
    let _ = writeln!(
        out,
        "max_endpoint_notifications: {} ({})",
        limits.max_endpoint_notifications, limits.overflow_policy
    );
    let _ = writeln!(
        out,
        "max_idle_duration_seconds: {}",
        limits.max_idle_duration.as_secs()
    );
    let _ = writeln!(out, "max_duration_seconds: {}", limits.max_duration.as_secs());
    out
}
