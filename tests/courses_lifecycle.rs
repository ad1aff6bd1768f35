mod test_support;

use serde_json::json;
use test_support::{
    create_course, request_err, request_ok, spawn_sidecar, temp_dir, workspace_with_library,
    OWNER,
};

#[test]
fn create_list_open_and_delete_course() {
    let workspace = temp_dir("pacingd-courses-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);
    let course_id = create_course(&mut stdin, &mut reader, &library_id, json!({}));
    let params = json!({ "actorId": OWNER, "courseId": course_id });

    let opened = request_ok(&mut stdin, &mut reader, "1", "courses.open", params.clone());
    assert_eq!(opened["course"]["title"].as_str(), Some("Biology 9"));
    assert_eq!(opened["course"]["scheduleModel"].as_str(), Some("every_day"));
    assert!(opened["course"]["abMeetingDay"].is_null());

    let _ = request_ok(&mut stdin, &mut reader, "2", "calendar.generate", params.clone());
    let _ = request_ok(&mut stdin, &mut reader, "3", "pacing.generate", params.clone());
    let _ = request_ok(&mut stdin, &mut reader, "4", "announcements.generate", params.clone());

    let listed = request_ok(&mut stdin, &mut reader, "5", "courses.list", json!({ "actorId": OWNER }));
    let courses = listed["courses"].as_array().expect("courses");
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["calendarDayCount"].as_i64(), Some(5));
    assert_eq!(courses[0]["plannedLessonCount"].as_i64(), Some(3));
    assert_eq!(courses[0]["announcementCount"].as_i64(), Some(3));

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "courses.list",
        json!({ "actorId": "teacher-2" }),
    );
    assert_eq!(other["courses"].as_array().map(|a| a.len()), Some(0));

    let deleted = request_ok(&mut stdin, &mut reader, "7", "courses.delete", params.clone());
    assert_eq!(deleted["stale"], json!(["classes"]));
    let code = request_err(&mut stdin, &mut reader, "8", "courses.open", params.clone());
    assert_eq!(code, "not_found");
    let code = request_err(&mut stdin, &mut reader, "9", "calendar.list", params);
    assert_eq!(code, "not_found");
}

#[test]
fn foreign_and_missing_courses_are_rejected() {
    let workspace = temp_dir("pacingd-courses-access");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);
    let course_id = create_course(&mut stdin, &mut reader, &library_id, json!({}));

    for (i, method) in ["calendar.generate", "pacing.generate", "announcements.generate", "courses.delete"]
        .iter()
        .enumerate()
    {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("f{}", i),
            method,
            json!({ "actorId": "teacher-2", "courseId": course_id }),
        );
        assert_eq!(code, "forbidden", "{}", method);
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "m1",
        "calendar.generate",
        json!({ "actorId": OWNER, "courseId": "no-such-course" }),
    );
    assert_eq!(code, "not_found");

    // The owner's course is untouched by the rejected calls.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "m2",
        "calendar.list",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );
    assert_eq!(listed["days"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn create_validates_dates_and_library() {
    let workspace = temp_dir("pacingd-courses-validate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);

    let base = |start: &str, end: &str| {
        json!({
            "actorId": OWNER,
            "libraryId": library_id,
            "scheduleModel": "every_day",
            "schoolYearStart": start,
            "schoolYearEnd": end,
        })
    };
    let code = request_err(&mut stdin, &mut reader, "1", "courses.create", base("2024-09-06", "2024-09-02"));
    assert_eq!(code, "bad_params");
    let code = request_err(&mut stdin, &mut reader, "2", "courses.create", base("2024-09-02", "2025-09-03"));
    assert_eq!(code, "bad_params");
    let code = request_err(&mut stdin, &mut reader, "3", "courses.create", base("2024-09-02", "not-a-date"));
    assert_eq!(code, "bad_params");

    let mut bad_model = base("2024-09-02", "2024-09-06");
    bad_model["scheduleModel"] = json!("rotating");
    let code = request_err(&mut stdin, &mut reader, "4", "courses.create", bad_model);
    assert_eq!(code, "bad_params");

    let mut no_model = base("2024-09-02", "2024-09-06");
    if let Some(obj) = no_model.as_object_mut() {
        obj.remove("scheduleModel");
    }
    let code = request_err(&mut stdin, &mut reader, "4b", "courses.create", no_model);
    assert_eq!(code, "bad_params");

    let mut unknown_lib = base("2024-09-02", "2024-09-06");
    unknown_lib["libraryId"] = json!("missing-library");
    let code = request_err(&mut stdin, &mut reader, "5", "courses.create", unknown_lib);
    assert_eq!(code, "not_found");

    // AB fields are dropped on an every_day course.
    let course_id = create_course(
        &mut stdin,
        &mut reader,
        &library_id,
        json!({ "abMeetingDay": "A", "abPatternStartDate": "2024-09-02" }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "courses.open",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );
    assert!(opened["course"]["abMeetingDay"].is_null());
    assert!(opened["course"]["abPatternStartDate"].is_null());
}

#[test]
fn reasons_are_global_or_owner_scoped() {
    let workspace = temp_dir("pacingd-courses-reasons");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);

    let defaults = request_ok(&mut stdin, &mut reader, "1", "reasons.list", json!({ "actorId": OWNER }));
    let labels: Vec<&str> = defaults["reasons"]
        .as_array()
        .expect("reasons")
        .iter()
        .filter_map(|r| r["label"].as_str())
        .collect();
    assert_eq!(labels.len(), 5);
    assert!(labels.contains(&"Holiday"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reasons.create",
        json!({ "actorId": "teacher-2", "label": "Field Trip" }),
    );
    let reason_id = created["reasonId"].as_str().expect("reasonId").to_string();

    let mine = request_ok(&mut stdin, &mut reader, "3", "reasons.list", json!({ "actorId": OWNER }));
    assert_eq!(mine["reasons"].as_array().map(|a| a.len()), Some(5));

    let course_id = create_course(&mut stdin, &mut reader, &library_id, json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calendar.generate",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.updateDay",
        json!({
            "actorId": OWNER,
            "courseId": course_id,
            "date": "2024-09-04",
            "dayType": "off",
            "reasonId": reason_id
        }),
    );
    assert_eq!(code, "not_found");
}
