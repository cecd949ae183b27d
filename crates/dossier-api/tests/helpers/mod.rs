//! Test helpers: build the router over a temporary upload directory.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use dossier_api::{setup_routes, AppState};
use dossier_core::ServerConfig;
use std::path::Path;
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of files currently stored under the upload directory.
    pub fn stored_file_count(&self) -> usize {
        count_files(self.upload_dir.path())
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

pub async fn setup_test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let upload_path = upload_dir.path().to_string_lossy().to_string();
    let config = ServerConfig::from_lookup(|key| match key {
        "UPLOAD_DIR" => Some(upload_path.clone()),
        "MAX_UPLOAD_SIZE_MB" => Some("2".to_string()),
        _ => None,
    })
    .expect("Failed to build config");

    let state = AppState::new(config)
        .await
        .expect("Failed to create app state");
    let app = setup_routes(state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp { server, upload_dir }
}

/// A PDF-looking attachment part.
pub fn pdf(name: &str) -> Part {
    Part::bytes(bytes::Bytes::from(format!("%PDF-1.4 {}", name)))
        .file_name(name.to_string())
        .mime_type("application/pdf")
}

pub fn personal_fields(form: MultipartForm, user_id: &str) -> MultipartForm {
    form.add_text("userId", user_id)
        .add_text("degree", "BSc Computer Science")
        .add_text("institution", "State University")
        .add_text("graduationYear", "2019")
        .add_text("portfolioLink", "https://example.com/me")
}

pub fn company_fields(form: MultipartForm, user_id: &str, period: &str) -> MultipartForm {
    form.add_text("userId", user_id)
        .add_text("companyName", "Acme")
        .add_text("jobTitle", "Engineer")
        .add_text("employmentPeriod", period)
        .add_text("salary", "85000")
}
