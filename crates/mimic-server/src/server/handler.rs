//! Per-request handling: request logging, template render, response write.

use crate::routes::{RouteMethod, RouteTable};
use crate::template::{RequestData, TemplateRegistry};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::{HeaderMap, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Fixed body for render failures; no diagnostic detail leaves the server.
const INTERNAL_ERROR_BODY: &str = "500 Internal Server Error\n";
const NOT_FOUND_BODY: &str = "404 Not Found\n";

/// Read-only state shared by every request task.
///
/// Both registries are fully built before the listener opens and never
/// mutated afterwards.
pub struct HandlerState {
    pub routes: RouteTable,
    pub templates: TemplateRegistry,
}

/// Handle one incoming request: log it, look up the bound template, render
/// it with the request as data context, and write the response.
pub(crate) async fn handle_request<B>(
    state: Arc<HandlerState>,
    req: Request<B>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
{
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    info!(
        id = %request_id,
        method = %method,
        remote_addr = %remote_addr,
        referer = %header_str(&headers, &REFERER),
        user_agent = %header_str(&headers, &USER_AGENT),
        uri = %uri,
        "Handling request"
    );

    let binding = match state
        .routes
        .lookup(&RouteMethod::from_request(&method), uri.path())
    {
        Some(binding) => binding.clone(),
        None => return Ok(build_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY)),
    };

    // The body is only read once a route matched; it feeds the render
    // context and the debug dump, nothing else.
    let body = match req.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&bytes).to_string())
            }
        }
        Err(_) => None,
    };

    debug!(
        id = %request_id,
        headers = ?headers,
        body = %body.as_deref().unwrap_or(""),
        "Request dump"
    );

    let request_data = RequestData::new(
        &request_id,
        method.as_str(),
        &uri,
        &headers,
        body.as_deref(),
        &remote_addr.to_string(),
    );

    match state.templates.render(&binding.template_name, &request_data) {
        Ok(rendered) => Ok(build_response(StatusCode::OK, rendered)),
        Err(err) => {
            error!(
                id = %request_id,
                template = %binding.template_name,
                error = %err,
                "Template render failed"
            );
            Ok(build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_BODY,
            ))
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Build an HTTP response with the given status and body.
///
/// Falls back to a bare 200 with the fixed error body in the unlikely
/// case the builder rejects its inputs.
fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from(INTERNAL_ERROR_BODY))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, RouteSpec};
    use tempfile::TempDir;

    async fn response_body(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn test_state(templates: &[(&str, &str)], routes: &[(&str, &str, &str)]) -> Arc<HandlerState> {
        let dir = TempDir::new().unwrap();
        for (name, contents) in templates {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();

        let config = Configuration {
            request_config: routes
                .iter()
                .map(|(template, resource, method)| RouteSpec {
                    response_template: template.to_string(),
                    resource: resource.to_string(),
                    method: method.to_string(),
                })
                .collect(),
        };
        Arc::new(HandlerState {
            routes: RouteTable::compile(&config),
            templates: registry,
        })
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:45000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_matched_route_renders_template() {
        let state = test_state(
            &[("hello.template", "Hello")],
            &[("hello.template", "/hi", "GET")],
        );

        let response = handle_request(state, request("GET", "/hi", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "Hello");
    }

    #[tokio::test]
    async fn test_template_sees_request_context() {
        let state = test_state(
            &[("echo.template", "${request.method} ${request.path} ${request.body}")],
            &[("echo.template", "/echo", "POST")],
        );

        let response = handle_request(state, request("POST", "/echo", "payload"), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "POST /echo payload");
    }

    #[tokio::test]
    async fn test_unmatched_path_is_not_found() {
        let state = test_state(
            &[("hello.template", "Hello")],
            &[("hello.template", "/hi", "GET")],
        );

        let response = handle_request(state, request("GET", "/other", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unmatched_method_is_not_found() {
        let state = test_state(
            &[("hello.template", "Hello")],
            &[("hello.template", "/hi", "GET")],
        );

        let response = handle_request(state, request("POST", "/hi", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_render_failure_answers_fixed_500() {
        let state = test_state(
            &[("strict.template", "${request.query.missing}")],
            &[("strict.template", "/strict", "GET")],
        );

        let response = handle_request(state, request("GET", "/strict", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_body(response).await, "500 Internal Server Error\n");
    }

    #[tokio::test]
    async fn test_missing_template_answers_fixed_500() {
        let state = test_state(&[], &[("ghost.template", "/ghost", "GET")]);

        let response = handle_request(state, request("GET", "/ghost", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_body(response).await, "500 Internal Server Error\n");
    }

    #[tokio::test]
    async fn test_query_parameters_reach_the_template() {
        let state = test_state(
            &[("greet.template", "Hello ${request.query.name}")],
            &[("greet.template", "/greet", "GET")],
        );

        let response = handle_request(state, request("GET", "/greet?name=World", ""), remote())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "Hello World");
    }
}
