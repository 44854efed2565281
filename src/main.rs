#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use lazy_static::lazy_static;
use log::{error, info};
use poem::endpoint::StaticFilesEndpoint;
use poem::{listener::TcpListener, Endpoint, EndpointExt, Route};
use poem_openapi::{payload::{Html, PlainText}, ApiResponse, OpenApi, OpenApiService};

// Poems Utilities
use crate::v1::poems::poem_get::GetPoemApi;
use crate::v1::poems::poems_list::ListPoemsApi;
use crate::v1::poems::upload_file::UploadFileApi;
use crate::v1::poems::upload_text::UploadTextApi;
use crate::v1::poems::version::VersionApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx};
use crate::utils::errors::Errors;
use crate::utils::poem_store::PoemStore;
use crate::utils::poems_utils::log_request;

// Modules
mod utils;
mod v1;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "PoemsServer"; // for poem logging
const PUBLIC_DIR  : &str = "public";      // static assets, relative to the working directory
const INDEX_FILE  : &str = "index.html";  // served at / and /public/

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters or create the data directories.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting poems_server!");

    // Initialize the server.
    poems_init();
    if RUNTIME_CTX.poems_args.create_dirs_only {
        info!("Data directories created under {}, exiting.", RUNTIME_CTX.poems_dirs.root_dir);
        return Ok(());
    }

    // The poems directory is the only shared state between requests.
    let store = match PoemStore::open(&RUNTIME_CTX.poems_dirs.poems_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Unable to open poems directory {}: {}", RUNTIME_CTX.poems_dirs.poems_dir, e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };
    info!("Poems are stored in {:?}.", store.poems_dir());

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let server_url = format!("{}:{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port);
    let app = make_app(store, &server_url);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    info!("{} running at {}", RUNTIME_CTX.parms.config.title, server_url);
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// poems_init:
// ---------------------------------------------------------------------------
/** Initialize logging, the data directories and the configuration. */
fn poems_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("*** Running {}={}",
          option_env!("CARGO_PKG_NAME").unwrap_or("poems_server"),
          option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"));
}

// ---------------------------------------------------------------------------
// make_app:
// ---------------------------------------------------------------------------
/** Assemble every route.  The poem endpoints and the index page sit at the
 * root, the generated OpenAPI documents at /spec, /spec_yaml and /docs, and
 * static assets under /public.  Every request goes through the access log.
 */
fn make_app(store: Arc<PoemStore>, server_url: &str) -> impl Endpoint {
    let endpoints = (
        HelloApi,
        UploadTextApi::new(store.clone()),
        UploadFileApi::new(store.clone()),
        ListPoemsApi::new(store.clone()),
        GetPoemApi::new(store),
        VersionApi,
    );
    let api_service = OpenApiService::new(endpoints, "Poems Server", env!("CARGO_PKG_VERSION"))
        .server(server_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/public", StaticFilesEndpoint::new(PUBLIC_DIR).index_file(INDEX_FILE))
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .around(log_request)
}

// ***************************************************************************
//                             Hello Endpoint
// ***************************************************************************
// Hello structure.
struct HelloApi;

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum IndexResponse {
    #[oai(status = 200)]
    Http200(Html<String>),
    #[oai(status = 404)]
    Http404(PlainText<&'static str>),
}

// ---------------------------------------------------------------------------
// hello and index endpoints:
// ---------------------------------------------------------------------------
#[OpenApi]
impl HelloApi {
    #[oai(path = "/hello", method = "get")]
    async fn index(&self) -> PlainText<&'static str> {
        info!("/hello route was called!");
        PlainText("Hey there, poetry lover!")
    }

    // The site root shows the index page from the public directory.
    #[oai(path = "/", method = "get", hidden)]
    async fn index_page(&self) -> IndexResponse {
        let path = std::path::Path::new(PUBLIC_DIR).join(INDEX_FILE);
        match std::fs::read_to_string(&path) {
            Ok(html) => IndexResponse::Http200(Html(html)),
            Err(e) => {
                info!("No index page at {:?}: {}", path, e);
                IndexResponse::Http404(PlainText("Not found."))
            },
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use serde_json::json;
    use tempfile::tempdir;

    fn test_client(dir: &std::path::Path) -> TestClient<impl Endpoint> {
        let store = Arc::new(PoemStore::open(dir.join("poems")).unwrap());
        TestClient::new(make_app(store, "http://localhost:3000"))
    }

    #[tokio::test]
    async fn hello() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());
        let resp = cli.get("/hello").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("Hey there, poetry lover!").await;
    }

    #[tokio::test]
    async fn upload_list_and_read() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());

        let resp = cli.post("/upload-text").body_json(&json!({"poemText": "\n Hope is the thing with feathers \n"})).send().await;
        resp.assert_status_is_ok();

        let resp = cli.get("/poems").query("page", &1).send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let poems = json.value().object().get("poems").array();
        assert_eq!(poems.len(), 1);
        let name = poems.get(0).string().to_string();
        assert!(name.ends_with(".txt"));

        let resp = cli.get(format!("/poem/{}", name)).send().await;
        resp.assert_status_is_ok();
        resp.assert_text("Hope is the thing with feathers").await;
    }

    #[tokio::test]
    async fn error_statuses() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());

        cli.post("/upload-text").body_json(&json!({"poemText": "   "})).send().await
            .assert_status(StatusCode::BAD_REQUEST);
        cli.get("/poem/..%2Fserver.js").send().await
            .assert_status(StatusCode::BAD_REQUEST);
        cli.get("/poem/nonexistent-name.txt").send().await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bodyless_uploads_are_bad_requests() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());

        let resp = cli.post("/upload-text").send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"message": "Empty poem not allowed!"})).await;

        let resp = cli.post("/upload-file").send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"message": "No file uploaded!"})).await;
    }

    #[tokio::test]
    async fn root_serves_index_page() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());
        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        let body = resp.0.into_body().into_string().await.unwrap();
        assert!(body.contains("<title>Poems</title>"));
    }

    #[tokio::test]
    async fn static_index_served() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());
        let resp = cli.get("/public/").send().await;
        resp.assert_status_is_ok();
    }

    #[tokio::test]
    async fn openapi_spec_served() {
        let dir = tempdir().unwrap();
        let cli = test_client(dir.path());
        let resp = cli.get("/spec").send().await;
        resp.assert_status_is_ok();
    }
}
