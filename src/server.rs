//! HTTP front end over [`MangaService`].

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::http::StatusCode;
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Responder, get, guard, middleware, web,
};
use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cbz::PackageError;
use crate::service::{MangaService, ServiceError};
use crate::store::{LocalStore, Retrieved, StoreError};

/// How often expired archives are swept out of a local store.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct AppState {
    pub service: MangaService,
    /// Set when archives are kept on this host and served from `/download`
    pub local_store: Option<Arc<LocalStore>>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RenameQuery {
    url: Option<String>,
    filename: Option<String>,
}

/// Headers attached to every response so browsers can call the API
/// from any origin.
pub fn cors() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}

/// Register every route. The preflight resource comes first so it
/// answers `OPTIONS` for any path.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(json!({
            "error": "Invalid query string",
            "message": err.to_string(),
        }));
        actix_web::error::InternalError::from_response(err, response).into()
    }))
    .service(
        web::resource("/{tail:.*}")
            .guard(guard::Options())
            .to(|| async { HttpResponse::NoContent().finish() }),
    )
    .service(docs)
    .service(health)
    .service(search)
    .service(info)
    .service(pages)
    .service(cbz)
    .service(download)
    .service(rename)
    .default_service(web::to(not_found));
}

pub async fn run(state: AppState, host: &str, port: u16) -> Result<()> {
    let data = web::Data::new(state);

    if let Some(store) = data.local_store.clone() {
        tokio::spawn(purge_periodically(store));
    }

    info!("Listening on http://{}:{}", host, port);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(cors())
            .configure(routes)
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}

async fn purge_periodically(store: Arc<LocalStore>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = store.purge_expired().await {
            warn!("Failed to purge {}: {}", store.dir().display(), e);
        }
    }
}

fn error_body(status: StatusCode, error: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": error }))
}

fn failure(error: &str, err: &anyhow::Error) -> HttpResponse {
    error!("{}: {:#}", error, err);
    HttpResponse::InternalServerError().json(json!({
        "error": error,
        "message": format!("{err:#}"),
    }))
}

fn origin(req: &HttpRequest) -> String {
    let conn = req.connection_info();
    format!("{}://{}", conn.scheme(), conn.host())
}

async fn not_found() -> HttpResponse {
    error_body(StatusCode::NOT_FOUND, "Endpoint not found")
}

#[get("/")]
async fn docs() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(DOCS_PAGE)
}

#[get("/health")]
async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "source": state.service.source_name(),
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[get("/search/{query}")]
async fn search(
    state: web::Data<AppState>,
    query: web::Path<String>,
    params: web::Query<PageQuery>,
) -> impl Responder {
    if query.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Query parameter is required");
    }
    match state.service.search(&query, params.page.unwrap_or(1)).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(e) => failure("Failed to search manga", &e),
    }
}

#[get("/info/{manga_id}")]
async fn info(state: web::Data<AppState>, manga_id: web::Path<String>) -> impl Responder {
    match state.service.info(&manga_id).await {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(e) => failure("Failed to fetch manga info", &e),
    }
}

#[get("/pages/{manga_id}/{chapter_id:.*}")]
async fn pages(state: web::Data<AppState>, path: web::Path<(String, String)>) -> impl Responder {
    let (manga_id, chapter_id) = path.into_inner();
    match state.service.pages(&manga_id, &chapter_id).await {
        Ok(pages) if pages.is_empty() => {
            error_body(StatusCode::NOT_FOUND, "No pages found for this chapter")
        }
        Ok(pages) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Chapter pages retrieved successfully",
            "mangaId": manga_id,
            "chapterId": chapter_id,
            "totalPages": pages.len(),
            "pages": pages,
        })),
        Err(e) => failure("Failed to fetch chapter pages", &e),
    }
}

#[get("/cbz/{manga_id}/{chapter_id:.*}")]
async fn cbz(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (manga_id, chapter_id) = path.into_inner();
    let base_url = origin(&req);

    match state
        .service
        .publish_chapter(&manga_id, &chapter_id, &base_url)
        .await
    {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => match e.downcast_ref::<ServiceError>() {
            Some(ServiceError::NoStore) => {
                error_body(StatusCode::BAD_REQUEST, "Archive storage is not configured")
            }
            _ => match e.downcast_ref::<PackageError>() {
                Some(PackageError::NoPages) => {
                    error_body(StatusCode::NOT_FOUND, "No pages found for this chapter")
                }
                _ => failure("Failed to create CBZ file", &e),
            },
        },
    }
}

#[get("/download/{file_name}")]
async fn download(state: web::Data<AppState>, file_name: web::Path<String>) -> impl Responder {
    let Some(store) = &state.local_store else {
        return error_body(StatusCode::NOT_FOUND, "Endpoint not found");
    };

    match store.read(&file_name).await {
        Ok(Retrieved::Found(bytes)) => HttpResponse::Ok()
            .content_type("application/zip")
            .insert_header(attachment(file_name.into_inner()))
            .body(bytes),
        Ok(Retrieved::Missing) => {
            error_body(StatusCode::NOT_FOUND, "File not found or has expired")
        }
        Ok(Retrieved::Expired) => {
            error_body(StatusCode::GONE, "File has expired and been removed")
        }
        Err(StoreError::InvalidFileName(_)) => {
            error_body(StatusCode::BAD_REQUEST, "Invalid filename")
        }
        Err(e) => failure("Failed to serve file", &anyhow::Error::from(e)),
    }
}

#[get("/rename")]
async fn rename(state: web::Data<AppState>, params: web::Query<RenameQuery>) -> impl Responder {
    let RenameQuery { url, filename } = params.into_inner();
    let (Some(url), Some(filename)) = (url, filename) else {
        return error_body(StatusCode::BAD_REQUEST, "Missing url or filename parameter");
    };

    match state.service.fetch_stored(&url).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("application/octet-stream")
            .insert_header(attachment(filename))
            .body(bytes),
        Err(e) if matches!(e.downcast_ref::<ServiceError>(), Some(ServiceError::ForeignUrl(_))) => {
            error_body(StatusCode::BAD_REQUEST, "Only catbox.moe files can be renamed")
        }
        Err(e) => failure("Failed to download file", &e),
    }
}

fn attachment(file_name: String) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name)],
    }
}

const DOCS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>mangacbz</title></head>
<body>
<h1>mangacbz</h1>
<p>Search manga, read chapter metadata and package chapters as CBZ archives.</p>
<ul>
<li><code>GET /search/{query}?page=1</code> search by title</li>
<li><code>GET /info/{mangaId}</code> series details and chapter list</li>
<li><code>GET /pages/{mangaId}/{chapterId}</code> page image URLs of a chapter</li>
<li><code>GET /cbz/{mangaId}/{chapterId}</code> build a CBZ archive and return its download link (and <code>expiresAt</code> for local storage)</li>
<li><code>GET /download/{fileName}</code> fetch a locally stored archive</li>
<li><code>GET /rename?url=&amp;filename=</code> fetch an uploaded archive under a chosen name</li>
<li><code>GET /health</code> service status</li>
</ul>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{FakeFetcher, FakeSource};
    use actix_web::http::Method;
    use actix_web::test;
    use serde_json::Value;

    fn state(local_store: Option<Arc<LocalStore>>) -> web::Data<AppState> {
        let mut service =
            MangaService::new(Arc::new(FakeSource::new()), Arc::new(FakeFetcher::new()))
                .with_page_delay(Duration::ZERO);
        if let Some(store) = &local_store {
            service = service.with_store(store.clone());
        }
        web::Data::new(AppState {
            service,
            local_store,
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state)
                    .wrap(cors())
                    .configure(routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["source"], "fake");
    }

    #[actix_web::test]
    async fn preflight_gets_no_content() {
        let app = app!(state(None));
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/cbz/demo/c001")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().contains_key("Access-Control-Allow-Methods"));
    }

    #[actix_web::test]
    async fn unknown_routes_are_json_404s() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Endpoint not found");
    }

    #[actix_web::test]
    async fn search_returns_results() {
        let app = app!(state(None));
        let req = test::TestRequest::get()
            .uri("/search/one%20piece?page=2")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["results"][0]["title"], "Result for one piece");
    }

    #[actix_web::test]
    async fn malformed_query_strings_are_json_400s() {
        let app = app!(state(None));
        let req = test::TestRequest::get()
            .uri("/search/one%20piece?page=abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid query string");
        assert!(body["message"].is_string());
    }

    #[actix_web::test]
    async fn blank_search_is_a_bad_request() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/search/%20%20").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn info_failures_are_500s() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/info/missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Failed to fetch manga info");
        assert_eq!(body["message"], "unknown manga missing");
    }

    #[actix_web::test]
    async fn pages_lists_images() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/pages/demo/c001").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["chapterId"], "c001");
        assert_eq!(body["pages"][1]["img"], "https://img/2.webp");
    }

    #[actix_web::test]
    async fn empty_chapters_are_404s() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/pages/demo/empty").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn cbz_without_store_is_a_bad_request() {
        let app = app!(state(None));
        let req = test::TestRequest::get().uri("/cbz/demo/c001").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn cbz_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        let app = app!(state(Some(store)));

        let req = test::TestRequest::get().uri("/cbz/demo/c001").to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["success"], true);
        assert_eq!(report["fileName"], "demo_c001.cbz");
        assert_eq!(report["totalPages"], 2);
        let created = chrono::DateTime::parse_from_rfc3339(report["createdAt"].as_str().unwrap())
            .unwrap();
        let expires = chrono::DateTime::parse_from_rfc3339(report["expiresAt"].as_str().unwrap())
            .unwrap();
        assert_eq!(expires - created, chrono::Duration::hours(48));
        assert!(
            report["downloadUrl"]
                .as_str()
                .unwrap()
                .ends_with("/download/demo_c001.cbz")
        );

        let req = test::TestRequest::get()
            .uri("/download/demo_c001.cbz")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(resp.headers().get("content-type").unwrap(), "application/zip");
        let bytes = test::read_body(resp).await;
        let archive = ::zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[actix_web::test]
    async fn download_statuses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.cbz"), b"x").unwrap();
        let store = Arc::new(LocalStore::new(dir.path()).with_retention(Duration::ZERO));
        let app = app!(state(Some(store)));

        for (uri, status) in [
            ("/download/missing.cbz", StatusCode::NOT_FOUND),
            ("/download/old.cbz", StatusCode::GONE),
            ("/download/..cbz", StatusCode::BAD_REQUEST),
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status, "{uri}");
        }
        assert!(!dir.path().join("old.cbz").exists());
    }

    #[actix_web::test]
    async fn rename_proxies_catbox_files() {
        let app = app!(state(None));

        let req = test::TestRequest::get()
            .uri("/rename?url=https%3A%2F%2Ffiles.catbox.moe%2Fab12.cbz&filename=demo_c001.cbz")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let disposition = resp.headers().get("content-disposition").unwrap();
        assert!(disposition.to_str().unwrap().contains("demo_c001.cbz"));
        assert_eq!(test::read_body(resp).await, "uploaded");

        for uri in [
            "/rename?url=https%3A%2F%2Ffiles.catbox.moe%2Fab12.cbz",
            "/rename?url=http%3A%2F%2Flocalhost%2F&filename=x",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
