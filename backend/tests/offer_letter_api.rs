#![cfg(unix)]

mod support;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use common::jobs::InFlightJob;
use common::model::offer::{OfferLetterStatus, OfferPhase, SendLetterResponse};
use serde_json::Value;
use support::{portal, Delivery, CONVERTS, CONVERTS_ONCE, CRASHES};

macro_rules! app {
    ($portal:expr) => {
        test::init_service(App::new().configure(backend::configure($portal.state.clone()))).await
    };
}

macro_rules! status_of {
    ($app:expr, $applicant_id:expr) => {{
        let req = test::TestRequest::get()
            .uri(&format!("/api/offer_letter/status/{}", $applicant_id))
            .to_request();
        test::call_and_read_body_json::<_, _, OfferLetterStatus>(&$app, req).await
    }};
}

#[actix_web::test]
async fn delivered_letter_is_stored_served_and_announced() {
    let portal = portal(CONVERTS, Delivery::Works);
    portal.seed_admitted(1);
    portal.seed_template();
    let app = app!(portal);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: SendLetterResponse = test::read_body_json(resp).await;
    assert_eq!(body.status, "processing");
    assert_eq!(body.detail, "Offer letter processing");
    assert_eq!(body.docx_url, "/media/admission_template/OfferLetter_1.docx");

    portal.wait_until_idle(1).await;

    let status = status_of!(app, 1);
    assert_eq!(status.status, OfferPhase::EmailSent);
    assert_eq!(status.progress, 100);
    assert_eq!(
        status.pdf_url.as_deref(),
        Some("/media/admission_template/OfferLetter_1.pdf")
    );

    let req = test::TestRequest::get()
        .uri("/media/admission_template/OfferLetter_1.pdf")
        .to_request();
    let pdf = test::call_and_read_body(&app, req).await;
    assert!(pdf.starts_with(b"%PDF"));

    assert_eq!(
        portal.count("SELECT COUNT(*) FROM mail_outbox WHERE recipient = 'applicant1@example.org'"),
        1
    );
    assert_eq!(
        portal.count("SELECT COUNT(*) FROM portal_notifications WHERE application_id = 1"),
        1
    );
    assert_eq!(
        portal.count("SELECT COUNT(*) FROM applications WHERE id = 1 AND status = 'Admitted'"),
        1
    );
    assert_eq!(
        portal.count(
            "SELECT COUNT(*) FROM admitted_students
             WHERE application_id = 1 AND admission_letter_sent = 1
               AND admission_letter_sent_at IS NOT NULL"
        ),
        1
    );
}

#[actix_web::test]
async fn failed_conversion_leaves_no_pdf() {
    let portal = portal(CRASHES, Delivery::Works);
    portal.seed_admitted(2);
    portal.seed_template();
    let app = app!(portal);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/2")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
    portal.wait_until_idle(2).await;

    let status = status_of!(app, 2);
    assert_eq!(status.status, OfferPhase::Failed);
    assert_eq!(status.progress, 0);
    assert_eq!(status.pdf_url, None);
    assert!(!portal
        .media_file("admission_template/OfferLetter_2.pdf")
        .exists());
    assert_eq!(portal.count("SELECT COUNT(*) FROM mail_outbox"), 0);
    assert_eq!(
        std::fs::read_dir(portal.root().join("work"))
            .map(|entries| entries.count())
            .unwrap_or(0),
        0,
        "scratch directories are removed"
    );
}

#[actix_web::test]
async fn failed_rerun_withdraws_the_previous_letter() {
    let portal = portal(CONVERTS_ONCE, Delivery::Works);
    portal.seed_admitted(9);
    portal.seed_template();
    let app = app!(portal);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/9")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
    portal.wait_until_idle(9).await;
    assert_eq!(status_of!(app, 9).status, OfferPhase::EmailSent);
    assert!(portal
        .media_file("admission_template/OfferLetter_9.pdf")
        .exists());

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/9")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
    portal.wait_until_idle(9).await;

    let status = status_of!(app, 9);
    assert_eq!(status.status, OfferPhase::Failed);
    assert_eq!(status.pdf_url, None);
    assert!(!portal
        .media_file("admission_template/OfferLetter_9.pdf")
        .exists());
    let req = test::TestRequest::get()
        .uri("/media/admission_template/OfferLetter_9.pdf")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn notification_failure_keeps_the_pdf() {
    let portal = portal(CONVERTS, Delivery::MailRelayDown);
    portal.seed_admitted(3);
    portal.seed_template();
    let app = app!(portal);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/3")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
    portal.wait_until_idle(3).await;

    let status = status_of!(app, 3);
    assert_eq!(status.status, OfferPhase::PdfReady);
    assert_eq!(status.progress, 90);
    assert!(status.pdf_url.is_some());
    assert!(portal
        .media_file("admission_template/OfferLetter_3.pdf")
        .exists());
    assert_eq!(
        portal.count("SELECT COUNT(*) FROM admitted_students WHERE admission_letter_sent = 1"),
        0
    );
}

#[actix_web::test]
async fn missing_template_is_rejected_without_touching_the_job() {
    let portal = portal(CONVERTS, Delivery::Works);
    portal.seed_admitted(4);
    let app = app!(portal);
    let before = status_of!(app, 4);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/4")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "No template uploaded for program 10");

    let after = status_of!(app, 4);
    assert_eq!(before, after);
    assert_eq!(after.status, OfferPhase::Pending);
    assert_eq!(after.docx_url, None);
    assert!(!portal.state.jobs.is_running(4));
}

#[actix_web::test]
async fn unrenderable_template_fails_the_request_without_touching_the_job() {
    let portal = portal(CONVERTS, Delivery::Works);
    portal.seed_admitted(8);
    portal.seed_template_file(b"not a docx archive");
    let app = app!(portal);
    let before = status_of!(app, 8);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/8")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"]
        .as_str()
        .is_some_and(|detail| detail.starts_with("failed to render offer letter")));

    let after = status_of!(app, 8);
    assert_eq!(before, after);
    assert_eq!(after.status, OfferPhase::Pending);
    assert_eq!(after.docx_url, None);
    assert!(!portal.state.jobs.is_running(8));
    assert!(!portal
        .media_file("admission_template/OfferLetter_8.docx")
        .exists());
}

#[actix_web::test]
async fn unknown_applicants_and_missing_admissions_are_not_found() {
    let portal = portal(CONVERTS, Delivery::Works);
    portal.seed_applicant(5);
    portal.seed_template();
    let app = app!(portal);

    for uri in [
        "/api/offer_letter/send_letter/999",
        "/api/offer_letter/send_letter/5",
    ] {
        let req = test::TestRequest::post().uri(uri).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND,
            "{uri}"
        );
    }
    let req = test::TestRequest::get()
        .uri("/api/offer_letter/status/999")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn back_to_back_trigger_conflicts_while_a_run_is_in_flight() {
    let slow = format!("sleep 1\n{CONVERTS}");
    let portal = portal(&slow, Delivery::Works);
    portal.seed_admitted(6);
    portal.seed_template();
    let app = app!(portal);

    let first = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/6")
        .to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::ACCEPTED);

    let second = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/6")
        .to_request();
    let resp = test::call_service(&app, second).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let mut listed = Vec::new();
    for _ in 0..50 {
        let req = test::TestRequest::get().uri("/api/offer_letter/jobs").to_request();
        listed = test::call_and_read_body_json::<_, _, Vec<InFlightJob>>(&app, req).await;
        if !listed.is_empty() {
            break;
        }
        actix_web::rt::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].applicant_id, 6);

    portal.wait_until_idle(6).await;
    assert_eq!(status_of!(app, 6).status, OfferPhase::EmailSent);

    let again = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/6")
        .to_request();
    assert_eq!(
        test::call_service(&app, again).await.status(),
        StatusCode::ACCEPTED,
        "a finished run frees the applicant"
    );
    portal.wait_until_idle(6).await;
}

#[actix_web::test]
async fn observed_phases_follow_the_success_path() {
    let slow = format!("sleep 0.3\n{CONVERTS}");
    let portal = portal(&slow, Delivery::Works);
    portal.seed_admitted(7);
    portal.seed_template();
    let app = app!(portal);

    let req = test::TestRequest::post()
        .uri("/api/offer_letter/send_letter/7")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

    let mut observed: Vec<OfferPhase> = Vec::new();
    loop {
        let status = status_of!(app, 7);
        if observed.last() != Some(&status.status) {
            observed.push(status.status);
        }
        if !portal.state.jobs.is_running(7) {
            let last = status_of!(app, 7).status;
            if observed.last() != Some(&last) {
                observed.push(last);
            }
            break;
        }
        actix_web::rt::time::sleep(std::time::Duration::from_millis(15)).await;
    }

    let success_path = [
        OfferPhase::DocxGenerated,
        OfferPhase::ConvertingPdf,
        OfferPhase::PdfReady,
        OfferPhase::EmailSent,
    ];
    let mut remaining = success_path.iter();
    for phase in &observed {
        assert!(
            remaining.any(|expected| expected == phase),
            "{observed:?} is not an ordered subsequence of the success path"
        );
    }
    assert_eq!(observed.first(), Some(&OfferPhase::DocxGenerated));
    assert_eq!(observed.last(), Some(&OfferPhase::EmailSent));

    let first = status_of!(app, 7);
    let second = status_of!(app, 7);
    assert_eq!(first, second, "status reads do not change the job");
}
