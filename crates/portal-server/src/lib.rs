use axum::http::StatusCode;
use axum::{Json, Router};
use portal_common::error::{handle_panic, method_not_allowed, not_found};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

#[derive(OpenApi)]
#[openapi(info(
    title = "Portal",
    description = "Minimal portal with placeholder index and login routes",
    license(name = "AGPL-3.0-or-later"),
))]
struct ApiDoc;

#[utoipa::path(get, path = "/", responses((status = OK)))]
async fn index() -> StatusCode {
    StatusCode::OK
}

#[utoipa::path(get, path = "/login", responses((status = OK)))]
async fn login() -> StatusCode {
    StatusCode::OK
}

pub fn app() -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(utoipa_axum::routes!(index))
        .routes(utoipa_axum::routes!(login))
        .split_for_parts();

    router
        .route("/openapi.json", axum::routing::get(move || async move { Json(api) }))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}
