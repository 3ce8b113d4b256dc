use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower::ServiceBuilder;

use storekeeper_alerts::{Notification, NotificationCategory};
use storekeeper_core::{ItemId, NotificationId, TenantId};
use storekeeper_infra::{
    AlertSink, EngineError, InMemoryInventory, InMemoryNotificationStore, NotificationEngine,
    Pagination, PostgresInventory, PostgresNotificationStore,
};

/// Message broadcast to SSE subscribers; tenant-filtered in the handler.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// API-local sink that broadcasts newly raised alerts to SSE subscribers.
#[derive(Debug)]
struct ApiAlertSink {
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AlertSink for ApiAlertSink {
    fn raised(&self, tenant_id: TenantId, notification: &Notification) {
        // Lossy broadcast; no backpressure on the engine.
        let _ = self.realtime_tx.send(RealtimeMessage {
            tenant_id,
            topic: "notifications.raised".to_string(),
            payload: notification_to_json(notification),
        });
    }
}

type InMemoryEngine =
    NotificationEngine<Arc<InMemoryInventory>, Arc<InMemoryNotificationStore>>;
type PersistentEngine = NotificationEngine<PostgresInventory, PostgresNotificationStore>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        engine: Arc<InMemoryEngine>,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
    Persistent {
        engine: Arc<PersistentEngine>,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
}

impl AppServices {
    fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        match self {
            AppServices::InMemory { realtime_tx, .. } => realtime_tx,
            AppServices::Persistent { realtime_tx, .. } => realtime_tx,
        }
    }

    async fn reconcile_and_fetch(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<Notification>, EngineError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.reconcile_and_fetch(tenant_id).await,
            AppServices::Persistent { engine, .. } => engine.reconcile_and_fetch(tenant_id).await,
        }
    }

    async fn dismiss(&self, id: NotificationId) -> Result<(), EngineError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.dismiss(id).await,
            AppServices::Persistent { engine, .. } => engine.dismiss(id).await,
        }
    }

    async fn list_all(
        &self,
        tenant_id: TenantId,
        pagination: Pagination,
    ) -> Result<Vec<Notification>, EngineError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.list_all(tenant_id, pagination).await,
            AppServices::Persistent { engine, .. } => engine.list_all(tenant_id, pagination).await,
        }
    }

    async fn schedule_reminder(
        &self,
        tenant_id: TenantId,
        item_id: Option<ItemId>,
        category: NotificationCategory,
        title: String,
        message: String,
        due_date: NaiveDate,
    ) -> Result<Notification, EngineError> {
        match self {
            AppServices::InMemory { engine, .. } => {
                engine
                    .schedule_reminder(tenant_id, item_id, category, title, message, due_date)
                    .await
            }
            AppServices::Persistent { engine, .. } => {
                engine
                    .schedule_reminder(tenant_id, item_id, category, title, message, due_date)
                    .await
            }
        }
    }
}

/// In-memory wiring (dev/test). Callers seed the inventory store directly,
/// standing in for the external inventory management flows.
pub fn in_memory_services(
    inventory: Arc<InMemoryInventory>,
    notifications: Arc<InMemoryNotificationStore>,
) -> AppServices {
    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    let sink: Arc<dyn AlertSink> = Arc::new(ApiAlertSink {
        realtime_tx: realtime_tx.clone(),
    });
    let engine = NotificationEngine::new(inventory, notifications).with_sink(sink);

    AppServices::InMemory {
        engine: Arc::new(engine),
        realtime_tx,
    }
}

/// Postgres wiring (production). Panics when `DATABASE_URL` is missing or
/// unreachable; the process cannot do anything useful without its store.
pub async fn persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    let sink: Arc<dyn AlertSink> = Arc::new(ApiAlertSink {
        realtime_tx: realtime_tx.clone(),
    });
    let engine = NotificationEngine::new(
        PostgresInventory::new(pool.clone()),
        PostgresNotificationStore::new(pool),
    )
    .with_sink(sink);

    AppServices::Persistent {
        engine: Arc::new(engine),
        realtime_tx,
    }
}

/// Select the backend from the environment, the same switch the rest of the
/// deployment tooling uses.
pub async fn services_from_env() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        persistent_services().await
    } else {
        in_memory_services(
            Arc::new(InMemoryInventory::new()),
            Arc::new(InMemoryNotificationStore::new()),
        )
    }
}

pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/notifications", notifications_router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

fn notifications_router() -> Router {
    Router::new()
        .route("/:tenant_id", get(reconcile_and_fetch))
        .route("/:tenant_id/all", get(list_all))
        .route("/:tenant_id/reminders", post(schedule_reminder))
        .route("/:tenant_id/stream", get(stream))
        .route("/dismiss/:notification_id", put(dismiss))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn reconcile_and_fetch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    let tenant_id: TenantId = match tenant_id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"),
    };

    match services.reconcile_and_fetch(tenant_id).await {
        Ok(pending) => (
            StatusCode::OK,
            Json(pending.iter().map(notification_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => engine_error_to_response(e),
    }
}

async fn dismiss(
    Extension(services): Extension<Arc<AppServices>>,
    Path(notification_id): Path<String>,
) -> axum::response::Response {
    let id: NotificationId = match notification_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid notification id")
        }
    };

    match services.dismiss(id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "dismissed": true }))).into_response(),
        Err(e) => engine_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn list_all(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    let tenant_id: TenantId = match tenant_id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"),
    };

    let pagination = Pagination::new(query.limit, query.offset);
    match services.list_all(tenant_id, pagination).await {
        Ok(all) => (
            StatusCode::OK,
            Json(all.iter().map(notification_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => engine_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleReminderRequest {
    category: String,
    title: String,
    message: String,
    item_id: Option<String>,
    due_date: NaiveDate,
}

async fn schedule_reminder(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<ScheduleReminderRequest>,
) -> axum::response::Response {
    let tenant_id: TenantId = match tenant_id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"),
    };

    let category: NotificationCategory = match body.category.parse() {
        Ok(v) => v,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let item_id: Option<ItemId> = match body.item_id.as_deref().map(str::parse).transpose() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services
        .schedule_reminder(
            tenant_id,
            item_id,
            category,
            body.title,
            body.message,
            body.due_date,
        )
        .await
    {
        Ok(stored) => {
            (StatusCode::CREATED, Json(notification_to_json(&stored))).into_response()
        }
        Err(e) => engine_error_to_response(e),
    }
}

async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    let tenant_id: TenantId = match tenant_id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"),
    };

    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok::<SseEvent, Infallible>(
                SseEvent::default().event(m.topic).data(data),
            ))
        }
        _ => None,
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

fn notification_to_json(notification: &Notification) -> serde_json::Value {
    serde_json::json!({
        "id": notification.id.to_string(),
        "tenant_id": notification.tenant_id.to_string(),
        "item_id": notification.item_id.map(|id| id.to_string()),
        "category": notification.category.as_str(),
        "title": notification.title,
        "message": notification.message,
        "due_date": notification.due_date,
        "is_read": notification.is_read,
        "created_at": notification.created_at,
    })
}

fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        EngineError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        EngineError::Store(e) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", e.to_string())
        }
    }
}

fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
