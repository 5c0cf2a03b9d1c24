//! Plugin HTTP API.
//!
//! The orchestrator POSTs JSON to `/Plugin.Activate` and
//! `/NetworkDriver.<Operation>` over the plugin socket.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::driver::Driver;
use crate::error::DriverError;
use crate::logging::log_request;
use crate::protocol::*;

/// Plugin subsystem implemented by this process.
const NETWORK_DRIVER: &str = "NetworkDriver";

/// Shared application state
pub struct AppState {
    pub driver: Driver,
}

/// JSON body with the plugin media type.
pub struct PluginJson<T>(pub T);

impl<T: Serialize> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        plugin_response(StatusCode::OK, &self.0)
    }
}

impl IntoResponse for DriverError {
    fn into_response(self) -> Response {
        plugin_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ErrorResponse {
                err: self.to_string(),
            },
        )
    }
}

fn plugin_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            (status, [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], bytes).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Decode the request body of `op`. An empty body decodes to the default
/// request. A malformed body is logged as a failed `op`.
fn decode<T: DeserializeOwned + Default>(op: &str, body: &Bytes) -> Result<T, DriverError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        let err = DriverError::bad_request(format!("malformed request: {}", e));
        log_request(op, None, None, Some(&err));
        err
    })
}

type ApiResult<T> = Result<PluginJson<T>, DriverError>;

/// Create the plugin API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/NetworkDriver.GetCapabilities", post(get_capabilities))
        .route("/NetworkDriver.CreateNetwork", post(create_network))
        .route("/NetworkDriver.AllocateNetwork", post(allocate_network))
        .route("/NetworkDriver.DeleteNetwork", post(delete_network))
        .route("/NetworkDriver.FreeNetwork", post(free_network))
        .route("/NetworkDriver.CreateEndpoint", post(create_endpoint))
        .route("/NetworkDriver.DeleteEndpoint", post(delete_endpoint))
        .route("/NetworkDriver.EndpointOperInfo", post(endpoint_info))
        .route("/NetworkDriver.Join", post(join))
        .route("/NetworkDriver.Leave", post(leave))
        .route("/NetworkDriver.DiscoverNew", post(discover_new))
        .route("/NetworkDriver.DiscoverDelete", post(discover_delete))
        .route(
            "/NetworkDriver.ProgramExternalConnectivity",
            post(program_external_connectivity),
        )
        .route(
            "/NetworkDriver.RevokeExternalConnectivity",
            post(revoke_external_connectivity),
        )
        .with_state(state)
}

async fn activate() -> PluginJson<ActivateResponse> {
    PluginJson(ActivateResponse {
        implements: vec![NETWORK_DRIVER.to_string()],
    })
}

async fn get_capabilities(
    State(state): State<Arc<AppState>>,
) -> ApiResult<CapabilitiesResponse> {
    Ok(PluginJson(state.driver.get_capabilities()?))
}

async fn create_network(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let req: CreateNetworkRequest = decode("CreateNetwork", &body)?;
    state.driver.create_network(&req).await?;
    Ok(PluginJson(Empty {}))
}

async fn allocate_network(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<AllocateNetworkResponse> {
    let req: AllocateNetworkRequest = decode("AllocateNetwork", &body)?;
    Ok(PluginJson(state.driver.allocate_network(&req)?))
}

async fn delete_network(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let req: DeleteNetworkRequest = decode("DeleteNetwork", &body)?;
    state.driver.delete_network(&req).await?;
    Ok(PluginJson(Empty {}))
}

async fn free_network(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let req: FreeNetworkRequest = decode("FreeNetwork", &body)?;
    state.driver.free_network(&req)?;
    Ok(PluginJson(Empty {}))
}

async fn create_endpoint(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<CreateEndpointResponse> {
    let req: CreateEndpointRequest = decode("CreateEndpoint", &body)?;
    Ok(PluginJson(state.driver.create_endpoint(&req).await?))
}

async fn delete_endpoint(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let req: DeleteEndpointRequest = decode("DeleteEndpoint", &body)?;
    state.driver.delete_endpoint(&req).await?;
    Ok(PluginJson(Empty {}))
}

async fn endpoint_info(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<InfoResponse> {
    let req: InfoRequest = decode("EndpointInfo", &body)?;
    Ok(PluginJson(state.driver.endpoint_info(&req).await?))
}

async fn join(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<JoinResponse> {
    let req: JoinRequest = decode("Join", &body)?;
    Ok(PluginJson(state.driver.join(&req).await?))
}

async fn leave(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let req: LeaveRequest = decode("Leave", &body)?;
    state.driver.leave(&req).await?;
    Ok(PluginJson(Empty {}))
}

async fn discover_new(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let notif: DiscoveryNotification = decode("DiscoverNew", &body)?;
    state.driver.discover_new(&notif)?;
    Ok(PluginJson(Empty {}))
}

async fn discover_delete(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Empty> {
    let notif: DiscoveryNotification = decode("DiscoverDelete", &body)?;
    state.driver.discover_delete(&notif)?;
    Ok(PluginJson(Empty {}))
}

async fn program_external_connectivity(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Empty> {
    let req: ProgramExternalConnectivityRequest = decode("ProgramExternalConnectivity", &body)?;
    state.driver.program_external_connectivity(&req)?;
    Ok(PluginJson(Empty {}))
}

async fn revoke_external_connectivity(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Empty> {
    let req: RevokeExternalConnectivityRequest = decode("RevokeExternalConnectivity", &body)?;
    state.driver.revoke_external_connectivity(&req)?;
    Ok(PluginJson(Empty {}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::logging::capture::{LogCapture, level_of};

    #[test]
    fn test_decode_empty_body_is_default() {
        let req: DeleteNetworkRequest = decode("DeleteNetwork", &Bytes::from_static(b"")).unwrap();
        assert_eq!(req, DeleteNetworkRequest::default());
        let req: LeaveRequest = decode("Leave", &Bytes::from_static(b" \n")).unwrap();
        assert!(req.endpoint_id.is_empty());
    }

    #[test]
    fn test_decode_malformed_body_is_bad_request() {
        let (logs, _guard) = LogCapture::install();

        let body = Bytes::from_static(b"{not json");
        let err = decode::<CreateNetworkRequest>("CreateNetwork", &body).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadRequest));

        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "{:#?}", lines);
        assert_eq!(level_of(&lines[0]), "WARN");
        assert!(
            lines[0].contains("[BadRequestError] CreateNetwork(): malformed request"),
            "{}",
            lines[0]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_logged_once_per_request() {
        let state = Arc::new(AppState {
            driver: Driver::new(Arc::new(crate::engine::MemoryEngine::new())),
        });
        let (logs, _guard) = LogCapture::install();

        let res = join(State(state), Bytes::from_static(b"[1, 2")).await;
        assert!(res.is_err());

        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "{:#?}", lines);
        assert!(lines[0].contains("[BadRequestError] Join(): malformed request"));
    }

    #[test]
    fn test_error_response_status_and_content_type() {
        let resp = DriverError::not_found("network n1 not found").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], PLUGIN_CONTENT_TYPE);
    }
}
