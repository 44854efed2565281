#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, param::Query, ApiResponse };
use log::error;

use crate::utils::errors::HttpMessage;
use crate::utils::poem_store::{normalize_page, PoemStore, PER_PAGE};
use crate::utils::poems_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct ListPoemsApi {
    store: Arc<PoemStore>,
}

impl ListPoemsApi {
    pub fn new(store: Arc<PoemStore>) -> Self {
        Self {store}
    }
}

struct ReqListPoems
{
    page: usize,
}

#[derive(Object, Debug)]
pub struct RespListPoems
{
    poems: Vec<String>,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqListPoems {
    type Req = ReqListPoems;
    fn get_request_info(&self) -> String {
        format!("  Request parameters:\n    page: {}", self.page)
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum PoemsResponse {
    #[oai(status = 200)]
    Http200(Json<RespListPoems>),
    #[oai(status = 500)]
    Http500(Json<HttpMessage>),
}

fn make_http_200(poems: Vec<String>) -> PoemsResponse {
    PoemsResponse::Http200(Json(RespListPoems {poems}))
}
fn make_http_500(msg: &str) -> PoemsResponse {
    PoemsResponse::Http500(Json(HttpMessage::new(msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl ListPoemsApi {
    /// List poem names, newest first, ten per page.
    #[oai(path = "/poems", method = "get")]
    async fn list_poems(&self, http_req: &Request, page: Query<Option<String>>) -> PoemsResponse {
        // Bad page values mean the first page.
        let req = ReqListPoems {page: normalize_page(page.0.as_deref())};
        poems_utils::debug_request(http_req, &req);

        match self.store.list_page(req.page, PER_PAGE) {
            Ok(poems) => make_http_200(poems),
            Err(e) => {
                error!("Error reading poems: {}", e);
                make_http_500("Error reading poems.")
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
    use poem::{http::StatusCode, test::TestClient};
    use poem_openapi::OpenApiService;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    // 25 poems named 1700000000000.txt through 1700000000024.txt.
    fn seeded_store(dir: &std::path::Path) -> Arc<PoemStore> {
        let store = PoemStore::open(dir).unwrap();
        for i in 0..25 {
            fs::write(store.poems_dir().join(format!("{}.txt", 1_700_000_000_000_i64 + i)), "x").unwrap();
        }
        Arc::new(store)
    }

    fn expected(range: std::ops::Range<i64>) -> Vec<String> {
        range.rev().map(|i| format!("{}.txt", 1_700_000_000_000_i64 + i)).collect()
    }

    #[tokio::test]
    async fn pages_newest_first() {
        let dir = tempdir().unwrap();
        let cli = TestClient::new(OpenApiService::new(ListPoemsApi::new(seeded_store(dir.path())), "test", "1.0"));

        let resp = cli.get("/poems").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"poems": expected(15..25)})).await;

        let resp = cli.get("/poems").query("page", &3).send().await;
        resp.assert_json(json!({"poems": expected(0..5)})).await;

        let resp = cli.get("/poems").query("page", &4).send().await;
        resp.assert_json(json!({"poems": []})).await;
    }

    #[tokio::test]
    async fn bad_pages_mean_first_page() {
        let dir = tempdir().unwrap();
        let cli = TestClient::new(OpenApiService::new(ListPoemsApi::new(seeded_store(dir.path())), "test", "1.0"));

        for page in ["0", "-2", "abc"] {
            let resp = cli.get("/poems").query("page", &page).send().await;
            resp.assert_status_is_ok();
            resp.assert_json(json!({"poems": expected(15..25)})).await;
        }
    }

    #[tokio::test]
    async fn leading_integer_selects_page() {
        let dir = tempdir().unwrap();
        let cli = TestClient::new(OpenApiService::new(ListPoemsApi::new(seeded_store(dir.path())), "test", "1.0"));

        for page in ["2abc", "2.9"] {
            let resp = cli.get("/poems").query("page", &page).send().await;
            resp.assert_status_is_ok();
            resp.assert_json(json!({"poems": expected(5..15)})).await;
        }
    }

    #[tokio::test]
    async fn unreadable_directory_is_server_error() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("poems"));
        fs::remove_dir_all(store.poems_dir()).unwrap();
        let cli = TestClient::new(OpenApiService::new(ListPoemsApi::new(store), "test", "1.0"));

        let resp = cli.get("/poems").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.assert_json(json!({"message": "Error reading poems."})).await;
    }
}
