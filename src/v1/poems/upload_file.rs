#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Multipart, ApiResponse, types::multipart::Upload };
use log::{error, info, warn};

use crate::utils::errors::{Errors, HttpMessage};
use crate::utils::poem_store::{FileUpload, PoemStore};
use crate::utils::poems_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct UploadFileApi {
    store: Arc<PoemStore>,
}

impl UploadFileApi {
    pub fn new(store: Arc<PoemStore>) -> Self {
        Self {store}
    }
}

#[derive(Multipart)]
struct ReqUploadFile
{
    #[oai(rename = "poemFile")]
    poem_file: Option<Upload>,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqUploadFile {
    type Req = ReqUploadFile;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    poemFile: ");
        match &self.poem_file {
            Some(f) => s.push_str(&format!("{} ({} bytes)", f.file_name().unwrap_or("<unnamed>"), f.size())),
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

fn make_http_200(msg: String) -> PoemsResponse {
    PoemsResponse::Http200(Json(HttpMessage::new(msg)))
}
fn make_http_400(msg: String) -> PoemsResponse {
    PoemsResponse::Http400(Json(HttpMessage::new(msg)))
}
fn make_http_500(msg: &str) -> PoemsResponse {
    PoemsResponse::Http500(Json(HttpMessage::new(msg)))
}

fn bad_request_handler(err: poem::Error) -> PoemsResponse {
    warn!("Rejected file upload with unreadable body: {}", err);
    make_http_400(Errors::MissingFile.to_string())
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl UploadFileApi {
    #[oai(path = "/upload-file", method = "post")]
    async fn upload_file(&self, http_req: &Request, req: ReqUploadFile) -> PoemsResponse {
        // Conditional logging depending on log level.
        poems_utils::debug_request(http_req, &req);

        // Pull the uploaded bytes into memory.
        let upload = match req.poem_file {
            Some(f) => {
                let file_name = f.file_name().map(str::to_string);
                match f.into_vec().await {
                    Ok(content) => Some(FileUpload::new(file_name, content)),
                    Err(e) => {
                        error!("Unable to read uploaded poem file: {}", e);
                        return make_http_500("Error saving poem.");
                    },
                }
            },
            None => None,
        };

        match self.store.store_file(upload) {
            Ok(name) => {
                info!("File poem saved as {}.", name);
                make_http_200(format!("Poem uploaded as {}!", name))
            },
            Err(e @ Errors::MissingFile) => {
                warn!("Rejected file upload: {}", e);
                make_http_400(e.to_string())
            },
            Err(e) => {
                error!("File upload failed: {}", e);
                make_http_500("Error saving poem.")
            },
        }
    }
}
