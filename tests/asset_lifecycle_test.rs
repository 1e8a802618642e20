mod common;

use astro_site_backend::services::worker::BackgroundWorker;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{PNG, Part, TestApp};
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

async fn city_with_image(app: &TestApp) -> (i64, String) {
    let (status, body) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Astrologer in Pune"),
                Part::png("image", "first.png"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["id"].as_i64().unwrap(),
        body["data"]["image"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_update_without_file_keeps_image() {
    let app = TestApp::spawn().await;
    let (id, image) = city_with_image(&app).await;

    let (status, body) = app
        .form(
            "PUT",
            &format!("/api/cities/{}", id),
            &[Part::Text("title", "Best astrologer in Pune")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "Best astrologer in Pune");
    assert_eq!(body["image"], image.as_str());
    assert!(app.asset_exists(&image));
}

#[tokio::test]
async fn test_replacing_image_retires_old_file() {
    let app = TestApp::spawn().await;
    let (id, old_image) = city_with_image(&app).await;

    let (status, body) = app
        .form(
            "PUT",
            &format!("/api/cities/{}", id),
            &[Part::png("image", "second.png")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let new_image = body["image"].as_str().unwrap();
    assert_ne!(new_image, old_image);
    assert!(new_image.ends_with("second.png"));

    app.state.cleaner.wait_idle().await;
    assert!(app.asset_exists(new_image));
    assert!(!app.asset_exists(&old_image));
    assert_eq!(app.files_in("cities"), 1);
}

#[tokio::test]
async fn test_remove_flag_clears_slot() {
    let app = TestApp::spawn().await;
    let (id, image) = city_with_image(&app).await;

    let (status, body) = app
        .form(
            "PUT",
            &format!("/api/cities/{}", id),
            &[Part::Text("remove_image", "true")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["image"].is_null());

    app.state.cleaner.wait_idle().await;
    assert!(!app.asset_exists(&image));
}

#[tokio::test]
async fn test_upload_wins_over_remove_flag() {
    let app = TestApp::spawn().await;
    let (id, old_image) = city_with_image(&app).await;

    let (status, body) = app
        .form(
            "PUT",
            &format!("/api/cities/{}", id),
            &[Part::Text("remove_image", "1"), Part::png("image", "third.png")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let image = body["image"].as_str().unwrap();
    assert!(image.ends_with("third.png"));

    app.state.cleaner.wait_idle().await;
    assert!(app.asset_exists(image));
    assert!(!app.asset_exists(&old_image));
}

#[tokio::test]
async fn test_banner_slots_are_independent() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .form(
            "POST",
            "/api/banners",
            &[
                Part::Text("title", "Diwali offer"),
                Part::png("desktop_image1", "wide.png"),
                Part::png("mob_image1", "narrow.png"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_i64().unwrap();
    assert_eq!(body["bannerId"], body["id"]);
    let mobile = body["data"]["mob_image1"].as_str().unwrap().to_string();
    assert!(body["data"]["desktop_image2"].is_null());

    let (status, body) = app
        .form(
            "PUT",
            &format!("/api/banners/{}", id),
            &[Part::png("desktop_image1", "wide-v2.png")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mob_image1"], mobile.as_str());
    assert!(body["desktop_image1"].as_str().unwrap().ends_with("wide-v2.png"));
}

#[tokio::test]
async fn test_delete_removes_owned_files() {
    let app = TestApp::spawn().await;
    let (id, image) = city_with_image(&app).await;

    let (status, _) = app.delete(&format!("/api/cities/{}", id)).await;
    assert_eq!(status, StatusCode::OK);

    app.state.cleaner.wait_idle().await;
    assert!(!app.asset_exists(&image));
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Astrologer in Pune"),
                Part::File {
                    name: "image",
                    file_name: "notes.pdf",
                    content_type: "application/pdf",
                    data: b"%PDF-1.4 fake",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (_, list) = app.get("/api/cities").await;
    assert!(list.as_array().unwrap().is_empty());
    assert_eq!(app.files_in("cities"), 0);
}

#[tokio::test]
async fn test_disguised_upload_is_rejected() {
    let app = TestApp::spawn().await;

    // Declared as PNG, bytes say PDF
    let (status, _) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Astrologer in Pune"),
                Part::File {
                    name: "image",
                    file_name: "photo.png",
                    content_type: "image/png",
                    data: b"%PDF-1.4\n%fake document",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.files_in("cities"), 0);
}

#[tokio::test]
async fn test_svg_upload_is_rejected() {
    let app = TestApp::spawn().await;
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#;

    // Caught by the declared type, then by the extension alone
    for (file_name, content_type) in [("logo.png", "image/svg+xml"), ("logo.svg", "image/png")] {
        let (status, body) = app
            .form(
                "POST",
                "/api/home-setting",
                &[Part::File {
                    name: "logo",
                    file_name,
                    content_type,
                    data: svg,
                }],
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body["error"]["kind"], "validation");
    }

    assert_eq!(app.files_in("home_setting"), 0);
    let (status, _) = app.get("/api/home-setting").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uploads_are_served_sandboxed() {
    let app = TestApp::spawn().await;
    let (_, image) = city_with_image(&app).await;

    let response = app
        .app
        .clone()
        .oneshot(Request::get(image.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_SECURITY_POLICY],
        "sandbox"
    );
    assert_eq!(
        response.headers()[header::X_CONTENT_TYPE_OPTIONS],
        "nosniff"
    );
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::spawn_with(|config| config.max_upload_size = 64).await;

    let mut big = PNG.to_vec();
    big.resize(1024, 0);

    let (status, body) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Astrologer in Pune"),
                Part::File {
                    name: "image",
                    file_name: "huge.png",
                    content_type: "image/png",
                    data: &big,
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (_, list) = app.get("/api/cities").await;
    assert!(list.as_array().unwrap().is_empty());
    assert_eq!(app.files_in("cities"), 0);
}

#[tokio::test]
async fn test_failed_write_discards_staged_upload() {
    let app = TestApp::spawn().await;
    city_with_image(&app).await;

    // Same slug passes validation of the upload but fails the unique check
    let (status, _) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune again"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Duplicate"),
                Part::png("image", "dupe.png"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.files_in("cities"), 1);
}

#[tokio::test]
async fn test_orphan_sweep_spares_referenced_files() {
    let app = TestApp::spawn().await;
    let (_, image) = city_with_image(&app).await;

    let orphan = app.upload_dir.path().join("cities").join("1-stray.png");
    std::fs::write(&orphan, PNG).unwrap();

    let (_tx, rx) = watch::channel(false);
    let worker = BackgroundWorker::new(
        app.state.db.clone(),
        app.state.store.clone(),
        app.state.cleaner.clone(),
        Duration::ZERO,
        Duration::from_secs(3600),
        rx,
    );

    let retired = worker.sweep_orphans().await.unwrap();
    assert_eq!(retired, 1);

    app.state.cleaner.wait_idle().await;
    assert!(!orphan.exists());
    assert!(app.asset_exists(&image));
}

#[tokio::test]
async fn test_orphan_sweep_honours_grace_period() {
    let app = TestApp::spawn().await;
    std::fs::create_dir_all(app.upload_dir.path().join("blogs")).unwrap();
    let fresh = app.upload_dir.path().join("blogs").join("1-fresh.png");
    std::fs::write(&fresh, PNG).unwrap();

    let (_tx, rx) = watch::channel(false);
    let worker = BackgroundWorker::new(
        app.state.db.clone(),
        app.state.store.clone(),
        app.state.cleaner.clone(),
        Duration::from_secs(24 * 3600),
        Duration::from_secs(3600),
        rx,
    );

    assert_eq!(worker.sweep_orphans().await.unwrap(), 0);
    assert!(fresh.exists());
}
