//! Record API integration tests.
//!
//! Run with: `cargo test -p dossier-api --test records_test`

mod helpers;

use axum_test::multipart::MultipartForm;
use helpers::{company_fields, pdf, personal_fields, setup_test_app};
use serde_json::Value;

#[tokio::test]
async fn test_fetch_missing_record_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/display-personal-details")
        .add_query_param("userId", "nobody")
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_fetch_requires_user_id() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/fetchCompanyDetails").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_create_then_update_personal_record() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = personal_fields(MultipartForm::new(), "user-1").add_part("resume", pdf("cv.pdf"));
    let response = client.post("/api/personal-details").multipart(form).await;
    assert_eq!(response.status_code(), 200);
    let created: Value = response.json();
    assert_eq!(created["success"], true);
    assert_eq!(created["action"], "created");
    assert_eq!(created["message"], "Personal details saved successfully");
    let resume = created["data"]["documents"]["resume"].clone();
    assert_eq!(resume["name"], "cv.pdf");
    assert!(created["data"]["documents"]["coverLetter"].is_null());

    let resume_path = resume["path"].as_str().expect("resume path").to_string();
    assert!(resume_path.starts_with("uploads/"));
    let download = client.get(&format!("/{}", resume_path)).await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(&download.as_bytes()[..], b"%PDF-1.4 cv.pdf");

    // keep the resume, add a cover letter
    let form = personal_fields(MultipartForm::new(), "user-1")
        .add_text("id", created["id"].as_str().unwrap_or_default())
        .add_text("keepResume", "true")
        .add_part("coverLetter", pdf("letter.pdf"));
    let response = client.post("/api/personal-details").multipart(form).await;
    assert_eq!(response.status_code(), 200);
    let updated: Value = response.json();
    assert_eq!(updated["action"], "updated");
    assert_eq!(updated["message"], "Personal details updated successfully");
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["data"]["documents"]["resume"]["path"], resume_path.as_str());
    assert_eq!(updated["data"]["documents"]["coverLetter"]["name"], "letter.pdf");

    let fetched: Value = client
        .get("/api/display-personal-details")
        .add_query_param("userId", "user-1")
        .await
        .json();
    assert_eq!(fetched["data"], updated["data"]);
    assert_eq!(app.stored_file_count(), 2);
}

#[tokio::test]
async fn test_missing_required_document_is_rejected_and_uploads_discarded() {
    let app = setup_test_app().await;

    let form =
        personal_fields(MultipartForm::new(), "user-2").add_part("coverLetter", pdf("letter.pdf"));
    let response = app.client().post("/api/personal-details").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Resume is required");
    assert_eq!(app.stored_file_count(), 0);

    let fetch = app
        .client()
        .get("/api/display-personal-details")
        .add_query_param("userId", "user-2")
        .await;
    assert_eq!(fetch.status_code(), 404);
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected() {
    let app = setup_test_app().await;

    let part = axum_test::multipart::Part::bytes(bytes::Bytes::from_static(b"MZ"))
        .file_name("cv.exe")
        .mime_type("application/octet-stream");
    let form = personal_fields(MultipartForm::new(), "user-3").add_part("resume", part);
    let response = app.client().post("/api/personal-details").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("not an accepted file type"));
    assert_eq!(app.stored_file_count(), 0);
}

#[tokio::test]
async fn test_malformed_employment_period_is_rejected() {
    let app = setup_test_app().await;

    let form = company_fields(MultipartForm::new(), "user-4", "2020-23")
        .add_part("appointmentLetter", pdf("appointment.pdf"));
    let response = app.client().post("/api/company-details").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("Employment period"));
}

#[tokio::test]
async fn test_payslips_keep_markers_and_append() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = company_fields(MultipartForm::new(), "user-5", "2020-2023")
        .add_part("appointmentLetter", pdf("appointment.pdf"))
        .add_part("payslips", pdf("p1.pdf"))
        .add_part("payslips", pdf("p2.pdf"))
        .add_part("payslips", pdf("p3.pdf"));
    let created: Value = client
        .post("/api/company-details")
        .multipart(form)
        .await
        .json();
    assert_eq!(created["action"], "created");
    assert_eq!(created["message"], "Company details saved successfully");
    assert_eq!(app.stored_file_count(), 4);

    // drop p1, keep p2 and p3, add p4
    let form = company_fields(MultipartForm::new(), "user-5", "2020-2023")
        .add_text("keepAppointmentLetter", "true")
        .add_text("keepPayslips", "1")
        .add_text("keepPayslips", "2")
        .add_part("payslips", pdf("p4.pdf"));
    let response = client.post("/api/company-details").multipart(form).await;
    assert_eq!(response.status_code(), 200);
    let updated: Value = response.json();

    let names: Vec<&str> = updated["data"]["documents"]["payslips"]
        .as_array()
        .expect("payslips array")
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert_eq!(names, vec!["p2.pdf", "p3.pdf", "p4.pdf"]);
    assert_eq!(
        updated["data"]["documents"]["appointmentLetter"],
        created["data"]["documents"]["appointmentLetter"]
    );
    assert_eq!(updated["data"]["documents"]["exitDocuments"], Value::Array(vec![]));
    assert_eq!(app.stored_file_count(), 4);
}

#[tokio::test]
async fn test_bad_keep_index_is_bad_request() {
    let app = setup_test_app().await;

    let form = company_fields(MultipartForm::new(), "user-6", "2020-2023")
        .add_part("appointmentLetter", pdf("appointment.pdf"))
        .add_text("keepPayslips", "first");
    let response = app.client().post("/api/company-details").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(app.stored_file_count(), 0);
}
