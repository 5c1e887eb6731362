mod common;

use common::{student, world};
use courseware_backend::config::Config;
use courseware_backend::data::course::db::{EnrollData, Enrollment};
use courseware_backend::data::course::EnrollType;
use courseware_backend::error::{CoreError, Rejection};
use courseware_backend::service::enrollment::{enroll, leave};
use courseware_backend::service::whitelist::import_roster;
use courseware_backend::store::Store;
use uuid::Uuid;

#[tokio::test]
async fn whitelisted_student_enrolls_others_are_rejected() {
    let w = world(EnrollType::Whitelist, None).await;
    import_roster(
        &w.store,
        &Config::default(),
        w.course.id,
        &w.teacher,
        "roster.csv",
        b"firstName,lastName,uid\nAda,Lovelace,al1\n",
    )
    .await
    .unwrap();

    let ada = student("al1", "Ada", "LOVELACE");
    let impostor = student("al2", "Ada", "Lovelace");

    assert_eq!(
        enroll(&w.store, w.course.id, &ada, &EnrollData::default())
            .await
            .unwrap(),
        Enrollment::Enrolled
    );
    let err = enroll(&w.store, w.course.id, &impostor, &EnrollData::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(Rejection::NotOnWhitelist)));

    let course = w.store.find_course_by_id(w.course.id).await.unwrap();
    assert_eq!(course.students, vec![ada.id]);
}

#[tokio::test]
async fn access_key_course() {
    let w = world(EnrollType::AccessKey, Some("s3cr3t")).await;
    let ada = student("al1", "Ada", "Lovelace");

    let err = enroll(&w.store, w.course.id, &ada, &EnrollData::with_key("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(Rejection::InvalidAccessKey)));

    assert_eq!(
        enroll(&w.store, w.course.id, &ada, &EnrollData::with_key("s3cr3t"))
            .await
            .unwrap(),
        Enrollment::Enrolled
    );
}

#[tokio::test]
async fn enrolling_twice_is_idempotent() {
    let w = world(EnrollType::Free, None).await;
    let ada = student("al1", "Ada", "Lovelace");
    let alan = student("at1", "Alan", "Turing");

    enroll(&w.store, w.course.id, &ada, &EnrollData::default())
        .await
        .unwrap();
    enroll(&w.store, w.course.id, &alan, &EnrollData::default())
        .await
        .unwrap();
    assert_eq!(
        enroll(&w.store, w.course.id, &ada, &EnrollData::default())
            .await
            .unwrap(),
        Enrollment::AlreadyEnrolled
    );

    let course = w.store.find_course_by_id(w.course.id).await.unwrap();
    assert_eq!(course.students, vec![ada.id, alan.id]);
}

#[tokio::test]
async fn inactive_course_keeps_members_but_takes_no_new_ones() {
    let w = world(EnrollType::Free, None).await;
    let ada = student("al1", "Ada", "Lovelace");
    enroll(&w.store, w.course.id, &ada, &EnrollData::default())
        .await
        .unwrap();

    let mut course = w.store.find_course_by_id(w.course.id).await.unwrap();
    course.active = false;
    w.store.save_course(&course).await.unwrap();

    let alan = student("at1", "Alan", "Turing");
    let err = enroll(&w.store, w.course.id, &alan, &EnrollData::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(Rejection::CourseInactive)));
    assert_eq!(
        w.store.find_course_by_id(w.course.id).await.unwrap().students,
        vec![ada.id]
    );
}

#[tokio::test]
async fn leaving_removes_student_at_any_position() {
    let w = world(EnrollType::Free, None).await;
    let students = [
        student("al1", "Ada", "Lovelace"),
        student("at1", "Alan", "Turing"),
        student("gh1", "Grace", "Hopper"),
    ];
    for s in &students {
        enroll(&w.store, w.course.id, s, &EnrollData::default())
            .await
            .unwrap();
    }

    leave(&w.store, w.course.id, &students[1]).await.unwrap();
    // not enrolled anymore, still fine
    leave(&w.store, w.course.id, &students[1]).await.unwrap();

    let course = w.store.find_course_by_id(w.course.id).await.unwrap();
    assert_eq!(course.students, vec![students[0].id, students[2].id]);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let w = world(EnrollType::Free, None).await;
    let err = enroll(
        &w.store,
        Uuid::new_v4(),
        &student("al1", "Ada", "Lovelace"),
        &EnrollData::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { kind: "course", .. }));
}
