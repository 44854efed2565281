#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::{Form, Json}, Object, ApiRequest, ApiResponse };
use serde::Deserialize;
use log::{error, info, warn};

use crate::utils::errors::{Errors, HttpMessage};
use crate::utils::poem_store::PoemStore;
use crate::utils::poems_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct UploadTextApi {
    store: Arc<PoemStore>,
}

impl UploadTextApi {
    pub fn new(store: Arc<PoemStore>) -> Self {
        Self {store}
    }
}

// A missing poemText is handled like an empty one.
#[derive(Object, Deserialize, Debug)]
pub struct ReqUploadText
{
    #[oai(rename = "poemText")]
    #[serde(rename = "poemText")]
    poem_text: Option<String>,
}

// The original form post and JSON clients are both accepted.
#[derive(ApiRequest)]
enum UploadTextBody {
    Form(Form<ReqUploadText>),
    Json(Json<ReqUploadText>),
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqUploadText {
    type Req = ReqUploadText;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    poemText: ");
        match &self.poem_text {
            Some(t) => s.push_str(&format!("{} chars", t.chars().count())),
            None => s.push_str("<missing>"),
        }
        s
    }
}

// ------------------- HTTP Status Codes -------------------
// A body that can't be parsed (none at all, no Content-Type, an unsupported
// type) carries no poem, so it gets the same 400 as a missing field.
#[derive(Debug, ApiResponse)]
#[oai(bad_request_handler = "bad_request_handler")]
enum PoemsResponse {
    #[oai(status = 200)]
    Http200(Json<HttpMessage>),
    #[oai(status = 400)]
    Http400(Json<HttpMessage>),
    #[oai(status = 500)]
    Http500(Json<HttpMessage>),
}

fn make_http_200(msg: &str) -> PoemsResponse {
    PoemsResponse::Http200(Json(HttpMessage::new(msg)))
}
fn make_http_400(msg: String) -> PoemsResponse {
    PoemsResponse::Http400(Json(HttpMessage::new(msg)))
}
fn make_http_500(msg: &str) -> PoemsResponse {
    PoemsResponse::Http500(Json(HttpMessage::new(msg)))
}

fn bad_request_handler(err: poem::Error) -> PoemsResponse {
    warn!("Rejected text upload with unreadable body: {}", err);
    make_http_400(Errors::EmptyInput.to_string())
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl UploadTextApi {
    #[oai(path = "/upload-text", method = "post")]
    async fn upload_text(&self, http_req: &Request, body: UploadTextBody) -> PoemsResponse {
        let req = match body {
            UploadTextBody::Form(Form(r)) => r,
            UploadTextBody::Json(Json(r)) => r,
        };

        // Conditional logging depending on log level.
        poems_utils::debug_request(http_req, &req);

        match self.store.store_text(req.poem_text.as_deref().unwrap_or_default()) {
            Ok(name) => {
                info!("Text poem saved as {}.", name);
                make_http_200("Poem saved!")
            },
            Err(e @ Errors::EmptyInput) => {
                warn!("Rejected text upload: {}", e);
                make_http_400(e.to_string())
            },
            Err(e) => {
                // The cause was logged by the store, the client gets a generic message.
                error!("Text upload failed: {}", e);
                make_http_500("Error saving poem.")
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
    use tempfile::tempdir;

    #[tokio::test]
    async fn json_and_form_uploads() {
        let dir = tempdir().unwrap();
        let store = Arc::new(PoemStore::open(dir.path()).unwrap());
        let cli = TestClient::new(OpenApiService::new(UploadTextApi::new(store.clone()), "test", "1.0"));

        let resp = cli.post("/upload-text").body_json(&json!({"poemText": "  a json poem  "})).send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Poem saved!"})).await;

        let resp = cli.post("/upload-text").form(&[("poemText", "a form poem")]).send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Poem saved!"})).await;

        let names = store.list_page(1, 10).unwrap();
        assert!(!names.is_empty());
        let contents: Vec<Vec<u8>> = names.iter().map(|n| store.get_by_name(n).unwrap()).collect();
        assert!(contents.contains(&b"a form poem".to_vec()));
    }

    #[tokio::test]
    async fn empty_poems_rejected() {
        let dir = tempdir().unwrap();
        let store = Arc::new(PoemStore::open(dir.path()).unwrap());
        let cli = TestClient::new(OpenApiService::new(UploadTextApi::new(store.clone()), "test", "1.0"));

        for body in [json!({"poemText": ""}), json!({"poemText": "  \n "}), json!({})] {
            let resp = cli.post("/upload-text").body_json(&body).send().await;
            resp.assert_status(StatusCode::BAD_REQUEST);
            resp.assert_json(json!({"message": "Empty poem not allowed!"})).await;
        }
        assert!(store.list_page(1, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_bodies_rejected() {
        let dir = tempdir().unwrap();
        let store = Arc::new(PoemStore::open(dir.path()).unwrap());
        let cli = TestClient::new(OpenApiService::new(UploadTextApi::new(store.clone()), "test", "1.0"));

        let resp = cli.post("/upload-text").send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"message": "Empty poem not allowed!"})).await;

        let resp = cli.post("/upload-text").content_type("text/plain").body("a plain poem").send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"message": "Empty poem not allowed!"})).await;

        assert!(store.list_page(1, 10).unwrap().is_empty());
    }
}
