use axum::{Router, http::StatusCode, routing::post};
use ballot_studio::render::{DrawBackend, HttpDrawBackend, RenderError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

/// Serves `router` on an ephemeral local port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake draw server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn decodes_pdf_and_passes_bubbles_through() {
    let router = Router::new().route(
        "/draw",
        post(|body: String| async move {
            assert_eq!(body, r#"{"title":"T"}"#);
            axum::Json(json!({
                "pdfb64": STANDARD.encode(b"%PDF-1.4 ballot"),
                "bubbles": {"contests": [{"x": 1, "y": 2}]},
            }))
        }),
    );
    let base = serve(router).await;
    let backend = HttpDrawBackend::new(Some(format!("{base}/draw")));

    let ballot = backend.render(r#"{"title":"T"}"#).await.expect("render");

    assert_eq!(&ballot.pdf[..], b"%PDF-1.4 ballot");
    assert_eq!(&ballot.bubbles[..], br#"{"contests":[{"x":1,"y":2}]}"#);
}

#[tokio::test]
async fn error_status_surfaces_as_render_error() {
    let router = Router::new().route(
        "/draw",
        post(|| async { (StatusCode::BAD_GATEWAY, "layout exploded") }),
    );
    let base = serve(router).await;
    let backend = HttpDrawBackend::new(Some(format!("{base}/draw")));

    let err = backend.render("{}").await.unwrap_err();

    match err {
        RenderError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "layout exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_response_is_rejected() {
    let router = Router::new().route("/draw", post(|| async { "not json" }));
    let base = serve(router).await;
    let backend = HttpDrawBackend::new(Some(format!("{base}/draw")));

    let err = backend.render("{}").await.unwrap_err();

    assert!(matches!(err, RenderError::Malformed(_)));
}

#[tokio::test]
async fn missing_endpoint_fails_every_render() {
    let backend = HttpDrawBackend::new(Some("  ".to_string()));

    assert!(backend.endpoint().is_none());
    assert!(matches!(
        backend.render("{}").await,
        Err(RenderError::NotConfigured)
    ));
}
