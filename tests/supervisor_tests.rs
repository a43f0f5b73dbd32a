mod common;

use axum::http::StatusCode;
use common::{TestApp, body_text, get, location, post_form, session_cookie};
use project_portal::{models::Notification, repository::Repository};

const SUPERVISOR_HOME: &str = "/supervisor/dashboard";

#[tokio::test]
async fn supervisor_builds_a_batch_and_members_are_notified() {
    let app = TestApp::new();
    let supervisor = app.seed_supervisor("Meena", "meena@example.com").await;
    let (guide_user, guide) = app.seed_faculty("Dr. Rao", "rao@example.com").await;
    let (student_user, student) = app.seed_student("Ravi", "ravi@example.com", "20A91A0501").await;
    let cookie = app.login_cookie(supervisor.id);

    // Create
    let form = "name=CSE-A1&year=2024&projectTitle=Smart+Attendance";
    let response = app
        .send(post_form("/supervisor/batches", form, Some(&cookie)))
        .await;
    assert_eq!(location(&response), SUPERVISOR_HOME);
    let batches = app.state.repo.list_batches().await.unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.project_title, "Smart Attendance");

    // Assign guide
    let uri = format!("/supervisor/batches/{}/guide", batch.id.to_hex());
    let response = app
        .send(post_form(&uri, &format!("facultyId={}", guide.id.to_hex()), Some(&cookie)))
        .await;
    assert_eq!(location(&response), SUPERVISOR_HOME);
    let batch = app.state.repo.get_batch(batch.id).await.unwrap().unwrap();
    assert_eq!(batch.guide, Some(guide.id));
    let guide_notes = app.state.repo.notifications_for(guide_user.id).await.unwrap();
    assert_eq!(guide_notes.len(), 1);
    assert!(guide_notes[0].message.contains("CSE-A1"));

    // Add student, by lower-case JNTU number.
    let uri = format!("/supervisor/batches/{}/students", batch.id.to_hex());
    let response = app.send(post_form(&uri, "jntuNumber=20a91a0501", Some(&cookie))).await;
    assert_eq!(location(&response), SUPERVISOR_HOME);
    let student = app.state.repo.get_student_by_user(student.user).await.unwrap().unwrap();
    assert_eq!(student.batch, Some(batch.id));
    assert_eq!(app.state.repo.notifications_for(student_user.id).await.unwrap().len(), 1);

    // The dashboards reflect the batch.
    let body = body_text(app.send(get(SUPERVISOR_HOME, Some(&cookie))).await).await;
    assert!(body.contains("Guide: Dr. Rao"));
    assert!(body.contains("Ravi (20A91A0501)"));

    let guide_cookie = app.login_cookie(guide_user.id);
    let body = body_text(app.send(get("/faculty/dashboard", Some(&guide_cookie))).await).await;
    assert!(body.contains("CSE-A1"));
    assert!(body.contains("Smart Attendance"));

    let student_cookie = app.login_cookie(student_user.id);
    let body = body_text(app.send(get("/student/dashboard", Some(&student_cookie))).await).await;
    assert!(body.contains("Dr. Rao"));
}

#[tokio::test]
async fn a_student_joins_only_one_batch() {
    let app = TestApp::new();
    let supervisor = app.seed_supervisor("Meena", "meena@example.com").await;
    let (student_user, _) = app.seed_student("Ravi", "ravi@example.com", "20A91A0501").await;
    let cookie = app.login_cookie(supervisor.id);

    for name in ["B1", "B2"] {
        let form = format!("name={name}&year=2024&projectTitle=Project");
        app.send(post_form("/supervisor/batches", &form, Some(&cookie))).await;
    }
    let batches = app.state.repo.list_batches().await.unwrap();
    assert_eq!(batches.len(), 2);

    for batch in &batches {
        let uri = format!("/supervisor/batches/{}/students", batch.id.to_hex());
        let response = app.send(post_form(&uri, "jntuNumber=20A91A0501", Some(&cookie))).await;
        assert_eq!(location(&response), SUPERVISOR_HOME);
    }

    let memberships: usize = app
        .state
        .repo
        .list_batches()
        .await
        .unwrap()
        .iter()
        .map(|b| b.students.len())
        .sum();
    assert_eq!(memberships, 1);
    assert_eq!(app.state.repo.notifications_for(student_user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_batch_requests_are_flashed() {
    let app = TestApp::new();
    let supervisor = app.seed_supervisor("Meena", "meena@example.com").await;
    let cookie = app.login_cookie(supervisor.id);

    let form = "name=B1&year=2024&projectTitle=P";
    app.send(post_form("/supervisor/batches", form, Some(&cookie))).await;

    let cases = [
        ("/supervisor/batches", "name=B2&year=soon&projectTitle=P", "a valid year"),
        (
            "/supervisor/batches",
            "name=B1&year=2024&projectTitle=P",
            "A batch named B1 already exists",
        ),
        ("/supervisor/batches/not-an-id/guide", "facultyId=x", "Batch not found"),
        ("/supervisor/batches/not-an-id/students", "jntuNumber=x", "Batch not found"),
    ];
    for (uri, form, message) in cases {
        let response = app.send(post_form(uri, form, Some(&cookie))).await;
        assert_eq!(location(&response), SUPERVISOR_HOME, "{uri}");
        let next = session_cookie(&response).unwrap();
        let body = body_text(app.send(get(SUPERVISOR_HOME, Some(&next))).await).await;
        assert!(body.contains(message), "{message}");
    }

    assert_eq!(app.state.repo.list_batches().await.unwrap().len(), 1);
}

// --- Notifications ---

#[tokio::test]
async fn only_the_recipient_marks_a_notification_read() {
    let app = TestApp::new();
    let (owner, _) = app.seed_student("Ravi", "ravi@example.com", "20A91A0501").await;
    let (intruder, _) = app.seed_student("Sita", "sita@example.com", "20A91A0502").await;
    let note = app
        .state
        .repo
        .create_notification(Notification::new(owner.id, "Welcome aboard"))
        .await
        .unwrap();
    let uri = format!("/student/notifications/{}/read", note.id.to_hex());

    let response = app.send(post_form(&uri, "", Some(&app.login_cookie(intruder.id)))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/student/dashboard");
    assert!(!app.state.repo.notifications_for(owner.id).await.unwrap()[0].read);

    let response = app.send(post_form(&uri, "", Some(&app.login_cookie(owner.id)))).await;
    assert_eq!(location(&response), "/student/dashboard");
    assert!(app.state.repo.notifications_for(owner.id).await.unwrap()[0].read);
}
