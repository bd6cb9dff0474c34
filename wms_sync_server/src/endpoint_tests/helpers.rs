use actix_web::{
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use log::debug;
use serde_json::Value;

/// Posts `body` to `path` on an app built by `configure`, and returns the status and the parsed JSON body.
pub async fn post_request<F>(path: &str, body: &str, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let _ = env_logger::try_init();
    let req =
        TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string()).to_request();
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request to {path}");
    let res = test::call_service(&app, req).await;
    let status = res.status();
    let bytes = test::read_body(res).await;
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Response is not JSON ({e}): {}", String::from_utf8_lossy(&bytes)));
    (status, json)
}
