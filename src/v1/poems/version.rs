#![forbid(unsafe_code)]

use poem_openapi::{ OpenApi, payload::Json, Object };

// From cargo.toml.
const POEMS_NAME: Option<&str> = option_env!("CARGO_PKG_NAME");
const POEMS_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object)]
struct RespVersion
{
    result_code: String,
    result_msg: String,
    server_name: String,
    server_version: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        Json(RespVersion::new("0", "success",
                              POEMS_NAME.unwrap_or("unknown"),
                              POEMS_VERSION.unwrap_or("unknown")))
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespVersion {
    fn new(result_code: &str, result_msg: &str, name: &str, version: &str) -> Self {
        Self {result_code: result_code.to_string(),
              result_msg: result_msg.to_string(),
              server_name: name.to_string(),
              server_version: version.to_string(),
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::test::TestClient;
    use poem_openapi::OpenApiService;
    use serde_json::json;

    #[tokio::test]
    async fn reports_package_version() {
        let cli = TestClient::new(OpenApiService::new(VersionApi, "test", "1.0"));
        let resp = cli.get("/version").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({
            "result_code": "0",
            "result_msg": "success",
            "server_name": "poems_server",
            "server_version": env!("CARGO_PKG_VERSION"),
        })).await;
    }
}
