#![allow(dead_code)]

use astro_site_backend::config::SiteConfig;
use astro_site_backend::entities::prelude::*;
use astro_site_backend::infrastructure::{database::setup_database, seed::seed_admin};
use astro_site_backend::services::assets::{AssetStore, LocalAssetStore, key_from_public};
use astro_site_backend::services::cleanup::AssetCleaner;
use astro_site_backend::utils::auth::create_jwt;
use astro_site_backend::{AppState, create_app};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::EntityTrait;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----astro-test-boundary-7MA4YWxkTrZu0gW";

/// Smallest byte sequence `infer` recognises as a PNG.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub token: String,
    pub upload_dir: TempDir,
    _shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// Fresh in-memory database, temp upload dir and a seeded admin.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(tweak: impl FnOnce(&mut SiteConfig)) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();

        let mut config = SiteConfig::development();
        config.upload_dir = upload_dir.path().to_path_buf();
        config.admin_username = Some("admin".to_string());
        config.admin_password = Some("s3cret-pass".to_string());
        tweak(&mut config);

        let db = setup_database(&config).await.unwrap();
        seed_admin(&db, &config).await.unwrap();
        let admin = Admin::find().one(&db).await.unwrap().unwrap();
        let token = create_jwt(admin.id, &config.jwt_secret, 1).unwrap();

        let store: Arc<dyn AssetStore> = Arc::new(LocalAssetStore::new(upload_dir.path()));
        let (shutdown, rx) = watch::channel(false);
        let (cleaner, _handle) = AssetCleaner::spawn(store.clone(), 3, rx);

        let state = AppState::new(db, store, cleaner, config);
        let app = create_app(state.clone());

        Self {
            app,
            state,
            token,
            upload_dir,
            _shutdown: shutdown,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_as_admin(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// JSON request with the admin token attached.
    pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Multipart request with the admin token attached.
    pub async fn form(&self, method: &str, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart(parts)))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::delete(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Whether the file a persisted `/Uploads/...` path points at exists.
    pub fn asset_exists(&self, public: &str) -> bool {
        let key = key_from_public(public).expect("path should point into the asset store");
        self.upload_dir.path().join(key).exists()
    }

    /// Number of files stored under one resource directory.
    pub fn files_in(&self, dir: &str) -> usize {
        std::fs::read_dir(self.upload_dir.path().join(dir))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

impl<'a> Part<'a> {
    pub fn png(name: &'a str, file_name: &'a str) -> Self {
        Part::File {
            name,
            file_name,
            content_type: "image/png",
            data: PNG,
        }
    }
}

pub fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
