//! Liveness probe.

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Health check endpoint.
///
/// Does not touch the database; it only shows that the process serves requests.
#[tracing::instrument()]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service liveness check",
    description = "Returns `ok` while the service accepts requests. Supports GET and HEAD for \
                   load balancers and container orchestrators.",
    responses(
        (status = 200, description = "Service is up", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn health() -> &'static str {
    "ok"
}
