#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::PlainText, param::Path, ApiResponse };
use log::{error, info};

use crate::utils::errors::Errors;
use crate::utils::poem_store::PoemStore;
use crate::utils::poems_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct GetPoemApi {
    store: Arc<PoemStore>,
}

impl GetPoemApi {
    pub fn new(store: Arc<PoemStore>) -> Self {
        Self {store}
    }
}

struct ReqGetPoem
{
    name: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGetPoem {
    type Req = ReqGetPoem;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request parameters:");
        s.push_str("\n    name: ");
        s.push_str(&self.name);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum PoemsResponse {
    #[oai(status = 200)]
    Http200(PlainText<String>),
    #[oai(status = 400)]
    Http400(PlainText<String>),
    #[oai(status = 404)]
    Http404(PlainText<String>),
    #[oai(status = 500)]
    Http500(PlainText<String>),
}

fn make_http_200(content: Vec<u8>) -> PoemsResponse {
    PoemsResponse::Http200(PlainText(String::from_utf8_lossy(&content).into_owned()))
}
fn make_http_400(msg: &str) -> PoemsResponse {
    PoemsResponse::Http400(PlainText(msg.to_string()))
}
fn make_http_404(msg: &str) -> PoemsResponse {
    PoemsResponse::Http404(PlainText(msg.to_string()))
}
fn make_http_500(msg: &str) -> PoemsResponse {
    PoemsResponse::Http500(PlainText(msg.to_string()))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GetPoemApi {
    #[oai(path = "/poem/:name", method = "get")]
    async fn get_poem(&self, http_req: &Request, name: Path<String>) -> PoemsResponse {
        let req = ReqGetPoem {name: name.0};
        poems_utils::debug_request(http_req, &req);

        match self.store.get_by_name(&req.name) {
            Ok(content) => make_http_200(content),
            Err(Errors::InvalidName(_)) => make_http_400("Invalid filename."),
            Err(Errors::NotFound(n)) => {
                info!("Poem not found: {}", n);
                make_http_404("Poem not found.")
            },
            Err(e) => {
                error!("Error reading poem {}: {}", req.name, e);
                make_http_500("Error reading poem.")
            },
        }
    }
}
