//! HTTP transport for the XML-RPC surface (spec §6): a single POST endpoint
//! that admits the request, decodes an XML-RPC `methodCall`, dispatches by
//! name through [`RpcServer::dispatch`], and wraps the resulting JSON
//! envelope as a single XML-RPC `<string>` response value.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dxr::{MethodCall, MethodResponse, TryFromValue, TryToValue, Value as XrValue};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tracing::{error, info, warn};

use crate::server::RpcServer;
use crate::validation::{admit, should_gzip, AdmissionError};

pub fn router(server: Arc<RpcServer>) -> Router {
    Router::new()
        .route("/RPC2", post(handle_call))
        .with_state(server)
}

/// Binds `addr` and serves the XML-RPC router until `running` clears,
/// polled once a second so shutdown is prompt (mirrors the indexing
/// supervisor's own cancellation-by-polling shape).
pub async fn serve(addr: SocketAddr, server: Arc<RpcServer>, running: Arc<AtomicBool>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "rpc listening");
    let app = router(server).into_make_service_with_connect_info::<SocketAddr>();
    let serve_fut = axum::serve(listener, app);
    tokio::select! {
        res = serve_fut => res,
        _ = wait_until_cleared(running) => Ok(()),
    }
}

async fn wait_until_cleared(running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn handle_call(
    State(server): State<Arc<RpcServer>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_encoding = headers
        .get(axum::http::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok());

    if let Err(err) = admit(body.len(), content_encoding) {
        let status = match err {
            AdmissionError::TooLarge => StatusCode::BAD_REQUEST,
            AdmissionError::UnsupportedEncoding => StatusCode::NOT_IMPLEMENTED,
        };
        return status.into_response();
    }

    let body_str = match std::str::from_utf8(&body) {
        Ok(s) => s,
        Err(_) => return (StatusCode::BAD_REQUEST, "request body is not UTF-8").into_response(),
    };

    let call: MethodCall = match quick_xml::de::from_str(body_str) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "malformed xml-rpc methodCall");
            return (StatusCode::BAD_REQUEST, "malformed xml-rpc request").into_response();
        }
    };

    let client_ip: IpAddr = peer.ip();
    let params: Vec<serde_json::Value> = call.params().iter().map(xmlrpc_to_json).collect();

    let envelope = server.dispatch(call.name(), &params, client_ip);
    let envelope_str = match serde_json::to_string(&envelope) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to serialize rpc envelope");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let response_value = match envelope_str.try_to_value() {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "failed to build xml-rpc response value");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };
    let response = MethodResponse::new(response_value);

    let xml = match quick_xml::se::to_string(&response) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to serialize xml-rpc response");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let accept_encoding = headers
        .get(axum::http::header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok());

    if should_gzip(accept_encoding, xml.len()) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(xml.as_bytes()).is_ok() {
            if let Ok(compressed) = encoder.finish() {
                return (
                    StatusCode::OK,
                    [
                        (axum::http::header::CONTENT_TYPE, "text/xml"),
                        (axum::http::header::CONTENT_ENCODING, "gzip"),
                    ],
                    compressed,
                )
                    .into_response();
            }
        }
    }

    (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "text/xml")], xml).into_response()
}

/// Converts one XML-RPC argument value into the JSON form handlers expect.
/// Native XML-RPC structs/arrays map onto JSON objects/arrays directly;
/// there is no JSON payload nested inside an argument to unwrap here (that
/// only happens for the *response*, per spec §6).
fn xmlrpc_to_json(value: &XrValue) -> serde_json::Value {
    use serde_json::json;

    if let Ok(s) = String::try_from_value(value) {
        return json!(s);
    }
    if let Ok(i) = i32::try_from_value(value) {
        return json!(i);
    }
    if let Ok(i) = i64::try_from_value(value) {
        return json!(i);
    }
    if let Ok(b) = bool::try_from_value(value) {
        return json!(b);
    }
    if let Ok(d) = f64::try_from_value(value) {
        return json!(d);
    }
    if let Ok(items) = Vec::<XrValue>::try_from_value(value) {
        return serde_json::Value::Array(items.iter().map(xmlrpc_to_json).collect());
    }
    serde_json::Value::Null
}
