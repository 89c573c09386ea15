use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const QUERY_TAG: &str = "Query API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = QUERY_TAG, description = "SQL query endpoints"),
    ),
    info(
        title = "Querier API",
        description = "SQL query gateway for ClickHouse",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
