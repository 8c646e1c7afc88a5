//! HTTP layer for schoolbook.
//!
//! Serves the JSON API (`/api/add-schools`, `/api/get-schools`), the
//! server-rendered pages, and the stored school images. All handlers share
//! one `AppState` carrying the database pool, settings, and media store.

use axum::Router;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::http::header::{HeaderName, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tokio::net::TcpListener;

use crate::error::AppError;
use crate::media::{IMAGE_DIR, MediaStore};
use crate::orm::{Db, Model};
use crate::schools::{self, ListFilter, NewSchool, School};
use crate::settings::Settings;
use crate::template::{Context, TemplateValue, render_template};

/// Hard server-side cap on an uploaded image, matching the client check.
const MAX_IMAGE_BYTES: usize = 5_000_000;

/// Request body limit for the upload route: the image cap plus headroom
/// for the text fields and multipart framing.
const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub settings: Settings,
    pub media: MediaStore,
}

/// The outcome of an HTTP handler. Supports HTML, JSON, and raw bytes with
/// custom status and headers, and bridges into axum via `IntoResponse`.
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Construct a new HTTP 200 response with a text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Response {
            status_code: 200,
            body: body.into().into_bytes(),
            headers: HashMap::new(),
        }
    }

    /// Construct a new HTTP 404 "not found" response.
    pub fn not_found() -> Self {
        Response {
            status_code: 404,
            body: b"404 Not Found".to_vec(),
            headers: HashMap::new(),
        }
    }

    /// Construct an HTML response.
    pub fn html(body: impl Into<String>, status_code: u16) -> Self {
        Response {
            status_code,
            body: body.into().into_bytes(),
            headers: content_type_header("text/html; charset=utf-8"),
        }
    }

    /// Construct a JSON response from any serde-serializable payload.
    pub fn json<T: Serialize>(data: T, status_code: u16) -> Self {
        let headers = content_type_header("application/json; charset=utf-8");
        match serde_json::to_vec(&data) {
            Ok(body) => Response {
                status_code,
                body,
                headers,
            },
            Err(_) => Response {
                status_code: 500,
                body: b"{\"error\": \"Serialization failed\"}".to_vec(),
                headers,
            },
        }
    }

    /// Construct a raw byte response with the given content type.
    pub fn bytes(body: Vec<u8>, content_type: &str) -> Self {
        Response {
            status_code: 200,
            body,
            headers: content_type_header(content_type),
        }
    }
}

fn content_type_header(value: &str) -> HashMap<String, String> {
    HashMap::from([("Content-Type".to_string(), value.to_string())])
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        for (key, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Build the application router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/add-school", get(add_school_page))
        .route("/schools", get(schools_page))
        .route(
            "/api/add-schools",
            post(add_school).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/get-schools", get(get_schools))
        .route("/schoolimage/{file}", get(school_image))
        .with_state(state)
}

/// Bind and serve the application. This is the production entry point.
pub async fn run(
    settings: Settings,
    db: Db,
    media: MediaStore,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let app = build_router(AppState {
        db,
        settings,
        media,
    });
    let listener = TcpListener::bind(&addr).await?;
    println!("HTTP Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// An image part read out of the multipart body.
struct Upload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))
}

/// Drain the multipart body into the submitted fields and the image part.
/// An empty image part counts as absent.
async fn read_submission(
    multipart: &mut Multipart,
) -> Result<(NewSchool, Option<Upload>), AppError> {
    let mut school = NewSchool::default();
    let mut upload = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let mut bytes: Vec<u8> = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::Multipart(e.to_string()))?
                {
                    if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                        return Err(AppError::validation("Max file size is 5MB."));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if !bytes.is_empty() {
                    upload = Some(Upload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            "name" => school.name = field_text(field).await?,
            "address" => school.address = field_text(field).await?,
            "city" => school.city = field_text(field).await?,
            "state" => school.state = field_text(field).await?,
            "contact" => school.contact = field_text(field).await?,
            "email_id" => school.email_id = field_text(field).await?,
            _ => {}
        }
    }
    Ok((school, upload))
}

/// POST /api/add-schools
///
/// The image is staged to disk before the insert and only moved into the
/// public directory once the row exists; a failed insert discards it.
async fn add_school(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let (school, upload) = read_submission(&mut multipart).await?;
    school.validate()?;
    let upload = upload.ok_or_else(|| AppError::validation("Image file is required."))?;
    if !ALLOWED_IMAGE_TYPES.contains(&upload.content_type.as_str()) {
        return Err(AppError::validation(
            "Only .jpg, .jpeg, .png and .webp formats are supported.",
        ));
    }

    let staged = state
        .media
        .stage_image(&upload.file_name, &upload.bytes)
        .await
        .map_err(AppError::Media)?;
    let image_path = staged.public_path().to_string();

    let affected = match school.insert(&state.db, &image_path).await {
        Ok(affected) => affected,
        Err(e) => {
            staged.discard().await;
            return Err(AppError::Database(e));
        }
    };
    if affected == 0 {
        staged.discard().await;
        return Err(AppError::internal("insert reported no affected rows"));
    }
    staged.commit().await.map_err(AppError::Media)?;

    info!("Added school `{}` with image {}", school.name, image_path);
    Ok(Response::json(
        json!({ "success": true, "message": "School added successfully." }),
        200,
    ))
}

/// GET /api/get-schools
async fn get_schools(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let filter = ListFilter::from_query_pairs(params);
    let result = async {
        School::ensure_table(&state.db).await?;
        schools::list_schools(&state.db, &filter).await
    }
    .await;
    match result {
        Ok(list) => Response::json(json!({ "schools": list }), 200),
        Err(e) => {
            error!("Error fetching schools: {}", e);
            Response::json(
                json!({
                    "error": "An error occurred while fetching schools.",
                    "details": e.to_string(),
                }),
                500,
            )
        }
    }
}

/// GET /schoolimage/{file}
async fn school_image(State(state): State<AppState>, UrlPath(file): UrlPath<String>) -> Response {
    if file.contains("..") || file.contains('/') || file.contains('\\') {
        return Response::not_found();
    }
    let path = state.settings.media.root.join(IMAGE_DIR).join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Response::bytes(bytes, image_content_type(&file)),
        Err(_) => Response::not_found(),
    }
}

fn image_content_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn index_page(State(state): State<AppState>) -> Response {
    render_page(&state, "index.html", Context::new())
}

async fn add_school_page(State(state): State<AppState>) -> Response {
    render_page(&state, "add_school.html", Context::new())
}

/// The listing page gets the current set of cities for its filter chips.
async fn schools_page(State(state): State<AppState>) -> Response {
    let cities = match School::ensure_table(&state.db).await {
        Ok(()) => schools::distinct_cities(&state.db)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load city filter options: {}", e);
                Vec::new()
            }),
        Err(e) => {
            error!("Failed to ensure schools table: {}", e);
            Vec::new()
        }
    };
    let mut context = Context::new();
    context.insert(
        "cities".to_string(),
        TemplateValue::List(cities.into_iter().map(TemplateValue::String).collect()),
    );
    render_page(&state, "schools.html", context)
}

fn render_page(state: &AppState, name: &str, mut context: Context) -> Response {
    context.insert(
        "base_url".to_string(),
        TemplateValue::String(state.settings.base_url.clone().unwrap_or_default()),
    );
    render_template(&state.settings.template.dir, name, &context)
}
