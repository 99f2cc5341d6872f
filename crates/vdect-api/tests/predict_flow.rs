//! End-to-end handler tests with stubbed classifiers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use ndarray::Array3;
use tower::util::ServiceExt;

use vdect_api::{create_router, ApiConfig, AppState, ModelBundle};
use vdect_engine::{
    AttentionStack, EngineResult, EnsembleConfig, FaceFrame, FrameNetwork, ImageClassifier,
    ImageForward, VideoEnsemble,
};
use vdect_explain::ExplanationGenerator;
use vdect_media::{FaceSource, MediaResult};

/// Image classifier stub with configurable logits and attention availability.
struct StubClassifier {
    logits: Vec<f32>,
    with_attentions: bool,
    labels: Vec<String>,
}

impl StubClassifier {
    fn new(logits: Vec<f32>, with_attentions: bool) -> Self {
        Self {
            logits,
            with_attentions,
            labels: vec!["REAL".to_string(), "FAKE".to_string()],
        }
    }
}

impl ImageClassifier for StubClassifier {
    fn forward(&self, _pixels: &Array3<f32>, want_attentions: bool) -> EngineResult<ImageForward> {
        let attentions = if want_attentions && self.with_attentions {
            // 5 tokens = CLS + 4 patches (2x2 grid)
            let layer = Array3::from_shape_fn((2, 5, 5), |(h, i, j)| {
                0.1 + (h + i + j) as f32 * 0.01
            });
            Some(AttentionStack::new(vec![layer.clone(), layer])?)
        } else {
            None
        };

        Ok(ImageForward {
            logits: self.logits.clone(),
            attentions,
        })
    }

    fn input_gradient(&self, pixels: &Array3<f32>) -> EngineResult<Array3<f32>> {
        Ok(Array3::from_shape_fn(pixels.dim(), |(c, y, x)| {
            (c + y + x) as f32 * 0.01 - 0.2
        }))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Frame network stub scoring by frame index.
struct StubNetwork {
    scores: Vec<f32>,
}

impl FrameNetwork for StubNetwork {
    fn name(&self) -> &str {
        "ed"
    }

    fn score(&self, face: &FaceFrame) -> EngineResult<f32> {
        Ok(self.scores[face.frame_index])
    }
}

/// Face source stub returning a fixed number of crops.
struct StubFaces {
    count: usize,
}

#[async_trait::async_trait]
impl FaceSource for StubFaces {
    async fn extract_faces(
        &self,
        _video_path: &Path,
        _target_count: usize,
    ) -> MediaResult<Vec<FaceFrame>> {
        Ok((0..self.count)
            .map(|frame_index| FaceFrame {
                image: image::RgbImage::from_pixel(8, 8, image::Rgb([127, 127, 127])),
                frame_index,
            })
            .collect())
    }
}

fn test_state(
    image: Arc<dyn ImageClassifier>,
    faces: Arc<dyn FaceSource>,
    frame_scores: Vec<f32>,
) -> AppState {
    let ensemble = VideoEnsemble::new(
        vec![Arc::new(StubNetwork {
            scores: frame_scores,
        })],
        EnsembleConfig::default(),
    )
    .unwrap();

    AppState {
        config: ApiConfig::default(),
        models: Arc::new(ModelBundle {
            image,
            ensemble: Arc::new(ensemble),
            faces,
        }),
        // No API key: explanations use the deterministic fallback
        explainer: Arc::new(ExplanationGenerator::new(None, Duration::from_secs(1))),
    }
}

fn multipart_upload(uri: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "test-boundary-7MA4YWxkTrZu0gW";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
    buffer
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![0.0, 1.0], true)),
        Arc::new(StubFaces { count: 1 }),
        vec![0.5],
    );
    let app = create_router(state, None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_image_prediction_returns_full_payload() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![0.2, 2.0], true)),
        Arc::new(StubFaces { count: 0 }),
        vec![],
    );
    let app = create_router(state, None);

    let request = multipart_upload("/predict_image", "photo.png", "image/png", &png_bytes(40, 30));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["metadata"]["filename"], "photo.png");
    assert_eq!(json["metadata"]["width"], 40);
    assert_eq!(json["metadata"]["height"], 30);
    assert_eq!(json["prediction"]["predicted_class"], "FAKE");
    assert_eq!(json["prediction"]["type"], "image");
    assert!(json["gradcam_heatmap"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
    let explanation = json["explanation"].as_str().unwrap();
    assert!(!explanation.is_empty());
    assert!(explanation.contains("fake"));
}

#[tokio::test]
async fn test_image_prediction_without_attentions_uses_gradient_fallback() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![3.0, 0.5], false)),
        Arc::new(StubFaces { count: 0 }),
        vec![],
    );
    let app = create_router(state, None);

    let request = multipart_upload("/predict_image", "photo.png", "image/png", &png_bytes(24, 24));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    // Fallback path still yields a full overlay and a REAL verdict here
    assert_eq!(json["prediction"]["predicted_class"], "REAL");
    assert!(json["gradcam_heatmap"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_image_upload_missing_file_is_bad_request() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![0.0, 1.0], true)),
        Arc::new(StubFaces { count: 0 }),
        vec![],
    );
    let app = create_router(state, None);

    let request = Request::builder()
        .method("POST")
        .uri("/predict_image")
        .header("content-type", "multipart/form-data; boundary=empty")
        .body(Body::from("--empty--\r\n"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_video_prediction_aggregates_frame_scores() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![0.0, 1.0], true)),
        Arc::new(StubFaces { count: 3 }),
        vec![0.9, 0.95, 0.8],
    );
    let app = create_router(state, None);

    let request = multipart_upload("/predict_video", "clip.mp4", "video/mp4", b"not a real video");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["metadata"]["filename"], "clip.mp4");
    assert_eq!(json["prediction"]["predicted_class"], "FAKE");
    assert_eq!(json["prediction"]["confidence_str"], "88.33%");
    assert_eq!(json["prediction"]["type"], "video");
    // No overlay for video
    assert!(json.get("gradcam_heatmap").is_none());

    let explanation = json["explanation"].as_str().unwrap();
    assert!(explanation.contains("fake"));
    assert!(explanation.contains("88.33%"));
}

#[tokio::test]
async fn test_video_with_no_faces_is_distinct_user_error() {
    let state = test_state(
        Arc::new(StubClassifier::new(vec![0.0, 1.0], true)),
        Arc::new(StubFaces { count: 0 }),
        vec![],
    );
    let app = create_router(state, None);

    let request = multipart_upload("/predict_video", "clip.mp4", "video/mp4", b"not a real video");
    let response = app.oneshot(request).await.unwrap();

    // User-correctable condition, not an internal failure
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let detail = json["detail"].as_str().unwrap();
    assert!(detail.contains("No face detected"));
    assert!(detail.contains("clear face"));
}
