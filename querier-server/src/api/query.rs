use crate::config::IpSource;
use crate::errors::ApiError;
use crate::executor::{QueryResult, ARG_DB, ARG_IP, ARG_SQL};
use crate::openapi::QUERY_TAG;
use crate::response::{JsonResponse, QueryResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Multipart, Request, State};
use axum::routing::post;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use log::{debug, error};
use std::collections::HashMap;
use std::net::SocketAddr;
use url::form_urlencoded;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Query arguments extracted from a single request.
///
/// Every field is always present; anything the client did not send is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub ip: String,
    pub db: String,
    pub sql: String,
}

impl QueryRequest {
    /// Converts the request into the argument map handed to the executor
    pub fn into_args(self) -> HashMap<String, String> {
        HashMap::from([
            (ARG_IP.to_string(), self.ip),
            (ARG_DB.to_string(), self.db),
            (ARG_SQL.to_string(), self.sql),
        ])
    }
}

/// Form fields accepted in the body of `POST /v1/query/`.
///
/// Only describes the body in the OpenAPI document; the fields are read by
/// [`QueryInput`]'s extractor.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub(crate) struct QueryForm {
    /// Database to run the query in
    db: Option<String>,
    /// SQL text to execute
    sql: Option<String>,
}

/// A [`QueryRequest`] as sent by the client, together with the connection peer
#[derive(Debug)]
pub(crate) struct QueryInput {
    request: QueryRequest,
    peer: Option<SocketAddr>,
}

impl QueryInput {
    /// Applies the configured `ip` source to the client-supplied request
    fn resolve(self, source: IpSource, configured_host: &str) -> QueryRequest {
        let mut request = self.request;
        request.ip = match source {
            IpSource::Request => request.ip,
            IpSource::Config => configured_host.to_string(),
            IpSource::Peer => self
                .peer
                .map(|addr| addr.ip().to_canonical().to_string())
                .unwrap_or_default(),
        };
        request
    }
}

enum FormKind {
    UrlEncoded,
    Multipart,
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();
    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if mime.eq_ignore_ascii_case("multipart/form-data") {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

/// First value stored under `key` in an urlencoded string
fn first_value(input: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

async fn read_multipart<S: Send + Sync>(
    req: Request,
    state: &S,
) -> Result<(String, String), ApiError> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;

    let mut db = None;
    let mut sql = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        let slot = match name.as_deref() {
            Some(ARG_DB) if db.is_none() => &mut db,
            Some(ARG_SQL) if sql.is_none() => &mut sql,
            _ => continue,
        };
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {}", e)))?;
        *slot = Some(value);
    }

    Ok((db.unwrap_or_default(), sql.unwrap_or_default()))
}

impl<S> FromRequest<S> for QueryInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ip = req
            .uri()
            .query()
            .and_then(|query| first_value(query.as_bytes(), ARG_IP))
            .unwrap_or_default();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (db, sql) = match form_kind(req.headers()) {
            Some(FormKind::UrlEncoded) => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read body: {}", e)))?;
                (
                    first_value(&body, ARG_DB).unwrap_or_default(),
                    first_value(&body, ARG_SQL).unwrap_or_default(),
                )
            }
            Some(FormKind::Multipart) => read_multipart(req, state).await?,
            // Non-form bodies carry no form fields
            None => (String::new(), String::new()),
        };

        Ok(QueryInput {
            request: QueryRequest { ip, db, sql },
            peer,
        })
    }
}

/// Executes a SQL query and returns its result set
#[utoipa::path(
    post,
    path = "/v1/query/",
    tag = QUERY_TAG,
    params(
        ("ip" = Option<String>, Query, description = "Host of the ClickHouse server to query"),
    ),
    request_body(content = QueryForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Query executed successfully", body = QueryResponse<QueryResult>),
        (status = 400, description = "Invalid parameters or query rejected by ClickHouse"),
        (status = 500, description = "Unexpected ClickHouse response"),
        (status = 502, description = "ClickHouse is unreachable or failed"),
        (status = 504, description = "Query timed out")
    )
)]
pub(super) async fn query_handler(
    State(state): State<AppState>,
    input: QueryInput,
) -> JsonResponse<QueryResult> {
    let request = input.resolve(state.config.ip_source, &state.config.clickhouse.host);
    debug!(
        "Executing query on ip '{}' db '{}': {}",
        request.ip, request.db, request.sql
    );

    let result = state.executor.execute(&request.into_args()).await;
    if let Err(e) = &result {
        error!("Failed to execute query: {}", e);
    }
    JsonResponse::from(result)
}

pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(query_handler))
        .route("/v1/query", post(query_handler))
}
