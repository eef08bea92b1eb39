//! HTTP surface
//!
//! JSON endpoints consumed by the web frontend:
//!
//! - GET /tareas - list the task mirror
//! - POST /agregar_tarea - add a manual task
//! - GET /list_classes - enumerate provider courses
//! - GET /sync_classroom - run a triggered sync pass
//! - POST /chat - conversational gateway
//!
//! Wire field names stay in Spanish for compatibility with the existing
//! frontend clients; everything behind the boundary uses the internal
//! types.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::classroom::{ClassroomError, CourseProvider};
use crate::context::AppContext;
use crate::db::TaskRecord;
use crate::gateway::GatewayError;
use crate::sync::SyncError;

/// Build the application router
///
/// CORS is permissive because the frontend is served from a different
/// origin, matching the original deployment.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/tareas", get(list_tareas_handler))
        .route("/agregar_tarea", post(agregar_tarea_handler))
        .route("/list_classes", get(list_classes_handler))
        .route("/sync_classroom", get(sync_classroom_handler))
        .route("/chat", post(chat_handler))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// One task on the wire
#[derive(Debug, Serialize)]
struct TareaDto {
    id: String,
    titulo: String,
    descripcion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    curso: Option<String>,
}

impl From<TaskRecord> for TareaDto {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            titulo: record.title,
            descripcion: record.description,
            curso: record.course_name,
        }
    }
}

/// Body of POST /agregar_tarea
#[derive(Debug, Deserialize)]
struct NuevaTarea {
    titulo: Option<String>,
    #[serde(default)]
    descripcion: String,
}

/// Body of POST /chat
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    mensaje: String,
}

/// List every task in the mirror
async fn list_tareas_handler(State(ctx): State<AppContext>) -> Response {
    match ctx.store.list().await {
        Ok(tasks) => {
            let tareas: Vec<TareaDto> = tasks.into_iter().map(TareaDto::from).collect();
            Json(tareas).into_response()
        }
        Err(e) => {
            error!("Failed to list tasks: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Add a manually entered task
///
/// Validation happens before any store mutation: a missing or blank
/// `titulo` is rejected with 400 and the mirror is untouched.
async fn agregar_tarea_handler(
    State(ctx): State<AppContext>,
    Json(payload): Json<NuevaTarea>,
) -> Response {
    let titulo = match payload.titulo.as_deref().map(str::trim) {
        Some(titulo) if !titulo.is_empty() => titulo.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "Falta el campo 'titulo'"),
    };

    match ctx.store.add_generated(&titulo, &payload.descripcion).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({"mensaje": "Tarea agregada correctamente"})),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to add task: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Enumerate all provider courses visible to the configured identity
async fn list_classes_handler(State(ctx): State<AppContext>) -> Response {
    match ctx.provider.list_courses().await {
        Ok(courses) => Json(courses).into_response(),
        Err(e) => classroom_error_response(e),
    }
}

/// Run one triggered sync pass over every tracked course
async fn sync_classroom_handler(State(ctx): State<AppContext>) -> Response {
    let tracked = &ctx.config.classroom.tracked_courses;

    match ctx.reconciler.sync_all(tracked).await {
        Ok(report) => Json(json!({
            "mensaje": format!("✅ Se sincronizaron {} tareas.", report.total_upserted()),
        }))
        .into_response(),
        Err(SyncError::Provider(e)) => classroom_error_response(e),
        Err(SyncError::Store(e)) => {
            error!("Sync failed against the store: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Conversational gateway endpoint
async fn chat_handler(
    State(ctx): State<AppContext>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    match ctx.gateway.handle(&payload.mensaje).await {
        Ok(respuesta) => Json(json!({"respuesta": respuesta})).into_response(),
        Err(GatewayError::Intent(e)) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
        Err(GatewayError::Store(e)) => {
            error!("Chat failed against the store: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Small status page
async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <title>Aula API</title>
</head>
<body>
    <h1>Aula API</h1>
    <p>El servidor está en funcionamiento.</p>
    <ul>
        <li>GET /tareas</li>
        <li>POST /agregar_tarea</li>
        <li>GET /list_classes</li>
        <li>GET /sync_classroom</li>
        <li>POST /chat</li>
    </ul>
</body>
</html>"#,
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn classroom_error_response(err: ClassroomError) -> Response {
    match &err {
        ClassroomError::NotFound(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        _ => error_response(StatusCode::BAD_GATEWAY, err.to_string()),
    }
}
