mod test_support;

use serde_json::json;
use test_support::{
    create_course, request_err, request_ok, spawn_sidecar, temp_dir, workspace_with_library,
    OWNER,
};

fn day_types(days: &serde_json::Value) -> Vec<(String, String, Option<String>)> {
    days.as_array()
        .expect("days array")
        .iter()
        .map(|d| {
            (
                d["classDate"].as_str().unwrap_or_default().to_string(),
                d["dayType"].as_str().unwrap_or_default().to_string(),
                d["abDay"].as_str().map(str::to_string),
            )
        })
        .collect()
}

#[test]
fn every_day_calendar_is_generated_once() {
    let workspace = temp_dir("pacingd-calendar-every-day");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);
    let course_id = create_course(&mut stdin, &mut reader, &library_id, json!({}));
    let params = json!({ "actorId": OWNER, "courseId": course_id });

    let first = request_ok(&mut stdin, &mut reader, "1", "calendar.generate", params.clone());
    assert_eq!(first["generated"].as_bool(), Some(true));
    assert_eq!(first["summary"]["total"].as_u64(), Some(5));
    assert_eq!(first["summary"]["instructional"].as_u64(), Some(5));
    assert_eq!(first["stale"], json!(["calendar", "classes"]));
    let days = day_types(&first["days"]);
    assert_eq!(days[0], ("2024-09-02".to_string(), "instructional".to_string(), None));
    assert_eq!(days[4].0, "2024-09-06");

    // Override one day, then confirm a plain regenerate keeps it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.updateDay",
        json!({
            "actorId": OWNER,
            "courseId": course_id,
            "date": "2024-09-03",
            "dayType": "off",
            "reasonId": "reason-default-1",
            "note": "Labor Day observed"
        }),
    );
    let second = request_ok(&mut stdin, &mut reader, "3", "calendar.generate", params.clone());
    assert_eq!(second["generated"].as_bool(), Some(false));
    assert_eq!(second["skipped"].as_bool(), Some(true));
    assert_eq!(second["summary"]["off"].as_u64(), Some(1));

    let listed = request_ok(&mut stdin, &mut reader, "4", "calendar.list", params.clone());
    let edited = &listed["days"][1];
    assert_eq!(edited["dayType"].as_str(), Some("off"));
    assert_eq!(edited["reasonId"].as_str(), Some("reason-default-1"));
    assert_eq!(edited["note"].as_str(), Some("Labor Day observed"));

    let forced = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.generate",
        json!({ "actorId": OWNER, "courseId": course_id, "force": true }),
    );
    assert_eq!(forced["generated"].as_bool(), Some(true));
    assert_eq!(forced["summary"]["off"].as_u64(), Some(0));
}

#[test]
fn ab_calendar_letters_weekdays_and_filters_meeting_day() {
    let workspace = temp_dir("pacingd-calendar-ab");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);
    let course_id = create_course(
        &mut stdin,
        &mut reader,
        &library_id,
        json!({
            "scheduleModel": "ab",
            "abMeetingDay": "A",
            "abPatternStartDate": "2024-09-02",
            "schoolYearEnd": "2024-09-10"
        }),
    );

    let out = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "calendar.generate",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );
    let days = day_types(&out["days"]);
    let expect = [
        ("2024-09-02", "instructional", Some("A")),
        ("2024-09-03", "off", Some("B")),
        ("2024-09-04", "instructional", Some("A")),
        ("2024-09-05", "off", Some("B")),
        ("2024-09-06", "instructional", Some("A")),
        ("2024-09-07", "off", None),
        ("2024-09-08", "off", None),
        ("2024-09-09", "off", Some("B")),
        ("2024-09-10", "instructional", Some("A")),
    ];
    assert_eq!(days.len(), expect.len());
    for (got, (date, ty, ab)) in days.iter().zip(expect.iter()) {
        assert_eq!(got.0, *date);
        assert_eq!(got.1, *ty, "day type on {}", date);
        assert_eq!(got.2.as_deref(), *ab, "letter on {}", date);
    }
}

#[test]
fn update_day_rejects_bad_input_before_writing() {
    let workspace = temp_dir("pacingd-calendar-update");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let library_id = workspace_with_library(&mut stdin, &mut reader, &workspace);
    let course_id = create_course(&mut stdin, &mut reader, &library_id, json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "calendar.generate",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.updateDay",
        json!({ "actorId": OWNER, "courseId": course_id, "date": "2024-09-03", "dayType": "holiday" }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "calendar.updateDay",
        json!({ "actorId": OWNER, "courseId": course_id, "date": "2024-13-03", "dayType": "off" }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "calendar.updateDay",
        json!({ "actorId": OWNER, "courseId": course_id, "date": "2025-01-06", "dayType": "off" }),
    );
    assert_eq!(code, "not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.updateDay",
        json!({
            "actorId": OWNER,
            "courseId": course_id,
            "date": "2024-09-03",
            "dayType": "off",
            "reasonId": "no-such-reason"
        }),
    );
    assert_eq!(code, "not_found");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "calendar.list",
        json!({ "actorId": OWNER, "courseId": course_id }),
    );
    assert_eq!(listed["summary"]["instructional"].as_u64(), Some(5));
}
