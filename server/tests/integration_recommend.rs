use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use recsys_core::persist::ArtifactPaths;
use recsys_core::pipeline::build_and_save;
use recsys_core::{BuildConfig, CatalogRecord, SharedRecommender, TitleKind};
use serde_json::Value;
use server::{build_app, load_recommender, load_with_timeout, AppState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;

fn rec(title: &str, description: &str, genres: &[&str]) -> CatalogRecord {
    CatalogRecord {
        title: title.into(),
        description: Some(description.into()),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        kind: TitleKind::Show,
    }
}

fn build_tiny_catalog(dir: &Path) {
    let records = vec![
        rec("Breaking Bad", "chemistry teacher cooks meth", &["Crime TV Shows", "TV Dramas"]),
        rec("Better Call Saul", "small time lawyer crime", &["Crime TV Shows", "TV Dramas"]),
        rec("The Office", "workplace mockumentary", &["TV Comedies"]),
    ];
    build_and_save(&records, &BuildConfig::default(), &ArtifactPaths::new(dir)).unwrap();
}

fn state(dir: &Path, shared: Arc<SharedRecommender>) -> AppState {
    AppState {
        artifacts_root: dir.to_path_buf(),
        recommender: shared,
        admin_token: Some("secret".into()),
        load_timeout: Duration::from_secs(5),
    }
}

async fn loaded_app(dir: &Path) -> Router {
    let shared = Arc::new(SharedRecommender::new());
    shared.install(load_recommender(dir.to_path_buf(), None, Duration::from_secs(5)).await.unwrap());
    build_app(state(dir, shared))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn recommend_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let app = loaded_app(dir.path()).await;

    let (status, json) = get(app, "/recommend?title=Breaking%20Bad&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["title"], "Better Call Saul");
    assert_eq!(arr[1]["title"], "The Office");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn lookup_ignores_case() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let app = loaded_app(dir.path()).await;

    let (_, lower) = get(app.clone(), "/recommend?title=breaking%20bad").await;
    let (_, upper) = get(app, "/recommend?title=BREAKING%20BAD").await;
    assert_eq!(lower["results"], upper["results"]);
    assert_eq!(lower["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let app = loaded_app(dir.path()).await;

    let (status, json) = get(app.clone(), "/recommend?title=Narcos").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "title_not_found");

    let (status, json) = get(app.clone(), "/recommend?title=The%20Office&k=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_k");

    let (status, _) = get(app.clone(), "/recommend?title=The%20Office&k=-3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = get(app, "/titles/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "The Office");
}

#[tokio::test]
async fn malformed_query_parameters_get_json_errors() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let app = loaded_app(dir.path()).await;

    let (status, json) = get(app.clone(), "/recommend?title=The%20Office&k=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_k");
    assert!(json["error"].as_str().unwrap().contains("abc"));

    let (status, json) = get(app.clone(), "/recommend?title=The%20Office&k=2.5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_k");

    let (status, json) = get(app.clone(), "/recommend?k=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_request");

    let (status, json) = get(app.clone(), "/recommend?title=%20&k=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_request");

    // an empty k falls back to the default
    let (status, json) = get(app, "/recommend?title=The%20Office&k=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn slow_load_times_out_and_installs_nothing() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let root = dir.path().to_path_buf();
    let shared = Arc::new(SharedRecommender::new());

    let result = load_with_timeout(Duration::from_millis(50), move || {
        std::thread::sleep(Duration::from_millis(500));
        let handle = recsys_core::persist::resolve(&ArtifactPaths::new(&root), None)?;
        Ok(recsys_core::persist::load_artifacts(&handle)?.into_recommender()?)
    })
    .await;
    let err = match result {
        Ok(_) => panic!("slow load should time out"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("timed out"));

    assert!(!shared.is_ready());
    let app = build_app(state(dir.path(), shared));
    let (status, _) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, json) = get(app, "/recommend?title=The%20Office").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "artifacts_unavailable");
}

#[tokio::test]
async fn empty_state_is_unavailable_until_reload() {
    let dir = tempdir().unwrap();
    build_tiny_catalog(dir.path());
    let app = build_app(state(dir.path(), Arc::new(SharedRecommender::new())));

    let (status, json) = get(app.clone(), "/recommend?title=The%20Office").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "artifacts_unavailable");

    let denied = Request::post("/admin/reload").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), denied).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = call(app.clone(), reload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);

    let (status, _) = get(app, "/recommend?title=The%20Office").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_artifacts_fail_to_load() {
    let dir = tempdir().unwrap();
    assert!(load_recommender(dir.path().to_path_buf(), None, Duration::from_secs(5)).await.is_err());
}
