mod config;
mod database;
mod error;
mod handlers;
mod models;
mod utils;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::post,
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use config::Config;
use database::{create_database_pool, run_migrations, Database};
use models::CategoryKind;
use utils::{images::UPLOADS_URL, ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub images: ImageStore,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for ImageStore {
    fn from_ref(state: &AppState) -> Self {
        state.images.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = Config::from_env()?;

    let db = create_database_pool(&config.database_url, config.max_connections).await?;
    if config.run_migrations {
        run_migrations(&db).await?;
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let state = AppState {
        db: db.clone(),
        images: ImageStore::new(&config.upload_dir),
    };
    let app = create_router(state, config.max_upload_bytes);

    let addr = config.bind_address();
    log::info!("inventory server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for ctrl-c: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let mut router = Router::new()
        // Categories
        .route("/categories/create", post(handlers::categories::create_category))
        .route("/categories/getAll", post(handlers::categories::list_categories))
        .route("/categories/getById", post(handlers::categories::get_category))
        .route("/categories/update", post(handlers::categories::update_category))
        .route("/categories/delete", post(handlers::categories::delete_category))

        // Items
        .route("/items/create", post(handlers::items::create_item))
        .route("/items/getAll", post(handlers::items::list_items))
        .route("/items/getList", post(handlers::items::list_item_names))
        .route("/items/getById", post(handlers::items::get_item))
        .route("/items/update", post(handlers::items::update_item))
        .route("/items/delete", post(handlers::items::delete_item))

        // Stock
        .route("/stock/create", post(handlers::stock::create_stock))
        .route("/stock/getByItemId", post(handlers::stock::get_stock))
        .route("/stock/update", post(handlers::stock::update_stock))
        .route("/stock/getAll", post(handlers::stock::list_stock))
        .route("/stock/balance", post(handlers::stock::stock_balance))

        // Material issuances
        .route("/issuances/create", post(handlers::issuances::create_issuance))
        .route("/issuances/getAll", post(handlers::issuances::list_issuances))
        .route("/issuances/getHistoryByItemId", post(handlers::issuances::item_history))
        .route("/issuances/getHistoryByEventId", post(handlers::issuances::event_history))
        .route("/issuances/getById", post(handlers::issuances::get_issuance))
        .route("/issuances/update", post(handlers::issuances::update_issuance))
        .route("/issuances/delete", post(handlers::issuances::delete_issuance))
        .route("/transactions", post(handlers::issuances::record_transaction))

        // Gallery
        .route("/gallery/design", post(handlers::gallery::upload_design))
        .route("/gallery/final", post(handlers::gallery::upload_final))
        .route("/gallery/getByEvent", post(handlers::gallery::event_images));

    // Per-category routes
    for kind in CategoryKind::ALL {
        router = router.merge(handlers::category_items::routes(kind));
    }

    let uploads = ServeDir::new(state.images.root());
    router
        // Uploaded images
        .nest_service(UPLOADS_URL, uploads)

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// Router over a pool that never connects. Only requests rejected before
    /// touching the database may be sent through it.
    fn app(upload_dir: &std::path::Path) -> Router {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://inventory@localhost/unused")
            .unwrap();
        create_router(
            AppState {
                db,
                images: ImageStore::new(upload_dir),
            },
            1024 * 1024,
        )
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn issuance_without_quantity_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/issuances/create",
                json!({"item_id": 1, "transaction_type": "OUT"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({
                "success": false,
                "error": "Item ID, transaction type, and quantity are required"
            })
        );
    }

    #[tokio::test]
    async fn unknown_transaction_type_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/transactions",
                json!({"item_id": 1, "transaction_type": "SIDEWAYS", "quantity": 3}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Transaction type must be either IN or OUT");
    }

    #[tokio::test]
    async fn sub_cent_quantities_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/issuances/create",
                json!({"item_id": 1, "transaction_type": "OUT", "quantity": "0.005"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Quantity cannot have more than 2 decimal places");
    }

    #[tokio::test]
    async fn malformed_json_uses_the_error_envelope() {
        let tmp = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/issuances/delete")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(tmp.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn item_creation_with_unmapped_category_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json("/items/create", json!({"name": "Lamp", "category_id": 12})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid category ID: 12");
    }

    #[tokio::test]
    async fn category_routes_validate_required_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/carpets/create",
                json!({"name": "Runner", "carpet_type": "Runner"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Name, carpet_type, material, and size are required for carpet items"
        );
    }

    #[tokio::test]
    async fn gallery_lookup_requires_an_event() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json("/gallery/getByEvent", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Event ID is required in request body"
        );
    }

    #[tokio::test]
    async fn uploads_are_served_from_the_image_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("inventory/items/1")).unwrap();
        std::fs::write(tmp.path().join("inventory/items/1/a.png"), b"png").unwrap();

        let request = Request::builder()
            .uri("/uploads/inventory/items/1/a.png")
            .body(Body::empty())
            .unwrap();
        let response = app(tmp.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png");
    }
}
