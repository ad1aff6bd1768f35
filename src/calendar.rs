use crate::access::{load_owned_course, AccessPolicy, Actor};
use crate::error::PlanError;
use crate::model::{AbDay, CalendarDay, CalendarDayEdit, Course, DayType, ScheduleModel};
use crate::regen::RegenerationPolicy;
use crate::store::PlannerStore;
use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, info};

#[derive(Debug)]
pub enum CalendarOutcome {
    Generated(Vec<CalendarDay>),
    /// A calendar already existed and `force` was not set; the rows are the existing ones.
    Skipped(Vec<CalendarDay>),
}

impl CalendarOutcome {
    pub fn days(&self) -> &[CalendarDay] {
        match self {
            Self::Generated(days) | Self::Skipped(days) => days,
        }
    }

    pub fn was_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalendarSummary {
    pub total: usize,
    pub instructional: usize,
    pub off: usize,
    pub half: usize,
    pub modified: usize,
}

impl CalendarSummary {
    pub fn of(days: &[CalendarDay]) -> Self {
        let mut s = Self {
            total: days.len(),
            ..Self::default()
        };
        for day in days {
            match day.day_type {
                DayType::Instructional => s.instructional += 1,
                DayType::Off => s.off += 1,
                DayType::Half => s.half += 1,
                DayType::Modified => s.modified += 1,
            }
        }
        s
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Lays out one row per date of the course's school year.
///
/// On AB schedules the A/B cursor advances only on weekdays on or after the
/// pattern start date, so weekends never consume a slot. A day whose letter
/// differs from the meeting-day filter is still lettered but becomes `off`.
pub fn build_calendar(course: &Course) -> Vec<CalendarDay> {
    let ab_start = match course.schedule_model {
        ScheduleModel::Ab => course.ab_pattern_start_date,
        ScheduleModel::EveryDay => None,
    };
    let mut cursor = AbDay::A;
    let mut days = Vec::new();

    for date in course
        .school_year_start
        .iter_days()
        .take_while(|d| *d <= course.school_year_end)
    {
        let weekend = is_weekend(date);
        let mut day_type = if weekend {
            DayType::Off
        } else {
            DayType::Instructional
        };
        let mut ab_day = None;

        if course.schedule_model == ScheduleModel::Ab
            && !weekend
            && ab_start.map_or(true, |start| date >= start)
        {
            ab_day = Some(cursor);
            if let Some(meeting) = course.ab_meeting_day {
                if meeting != cursor {
                    day_type = DayType::Off;
                }
            }
            cursor = cursor.flip();
        }

        days.push(CalendarDay {
            date,
            day_type,
            ab_day,
            reason_id: None,
            note: None,
        });
    }
    days
}

pub fn generate(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
    force: bool,
) -> Result<CalendarOutcome, PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let policy = RegenerationPolicy::calendar(force);

    let existing = store.calendar_day_count(&course.id)?;
    if policy.keeps_existing(existing) {
        debug!(course_id = %course.id, existing, "calendar exists; skipping generation");
        return Ok(CalendarOutcome::Skipped(store.calendar_days(&course.id)?));
    }

    let days = build_calendar(&course);
    if policy.clears_before_write() {
        store.replace_calendar(&course.id, &days)?;
    } else if !store.create_calendar_if_absent(&course.id, &days)? {
        // Another writer created the calendar between the count and the insert.
        return Ok(CalendarOutcome::Skipped(store.calendar_days(&course.id)?));
    }

    info!(
        course_id = %course.id,
        rows = days.len(),
        policy = policy.label(),
        "calendar generated"
    );
    Ok(CalendarOutcome::Generated(days))
}

pub fn list(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<(Course, Vec<CalendarDay>), PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let days = store.calendar_days(&course.id)?;
    Ok((course, days))
}

/// Operator override of a single generated row.
pub fn update_day(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
    date: NaiveDate,
    edit: &CalendarDayEdit,
) -> Result<(), PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    if let Some(reason_id) = edit.reason_id.as_deref() {
        if !store.reason_visible(&actor.id, reason_id)? {
            return Err(PlanError::NotFound("reason"));
        }
    }
    if !store.update_calendar_day(&course.id, date, edit)? {
        return Err(PlanError::NotFound("calendar day"));
    }
    info!(course_id = %course.id, %date, day_type = %edit.day_type, "calendar day updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::OwnerPolicy;
    use crate::db;
    use crate::store::SqliteStore;
    use rusqlite::Connection;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn course(model: ScheduleModel, meeting: Option<AbDay>, ab_start: Option<NaiveDate>) -> Course {
        Course {
            id: "course-1".into(),
            owner_id: "teacher-1".into(),
            title: "Algebra I - P2".into(),
            class_name: "Algebra I".into(),
            selected_library_id: "lib-1".into(),
            schedule_model: model,
            ab_meeting_day: meeting,
            ab_pattern_start_date: ab_start,
            school_year_start: d(2024, 9, 2),
            school_year_end: d(2024, 9, 6),
        }
    }

    fn seed(conn: &Connection, c: &Course) {
        db::init_schema(conn).expect("schema");
        conn.execute(
            "INSERT INTO curriculum_libraries(id, provider, class_code, class_name) VALUES(?, 'mm', 'A1', 'Algebra I')",
            [&c.selected_library_id],
        )
        .expect("library");
        SqliteStore::new(conn).insert_course(c).expect("course");
    }

    #[test]
    fn every_day_week_is_all_instructional() {
        let days = build_calendar(&course(ScheduleModel::EveryDay, None, None));
        assert_eq!(days.len(), 5);
        assert!(days.iter().all(|x| x.day_type == DayType::Instructional));
        assert!(days.iter().all(|x| x.ab_day.is_none()));
        assert_eq!(days[0].date, d(2024, 9, 2));
        assert_eq!(days[4].date, d(2024, 9, 6));
    }

    #[test]
    fn meeting_day_a_keeps_only_a_days() {
        let days = build_calendar(&course(ScheduleModel::Ab, Some(AbDay::A), Some(d(2024, 9, 2))));
        let letters: Vec<_> = days.iter().map(|x| x.ab_day).collect();
        assert_eq!(
            letters,
            vec![
                Some(AbDay::A),
                Some(AbDay::B),
                Some(AbDay::A),
                Some(AbDay::B),
                Some(AbDay::A)
            ]
        );
        let instructional: Vec<_> = days
            .iter()
            .filter(|x| x.day_type == DayType::Instructional)
            .map(|x| x.date)
            .collect();
        assert_eq!(instructional, vec![d(2024, 9, 2), d(2024, 9, 4), d(2024, 9, 6)]);
    }

    #[test]
    fn weekends_are_off_and_do_not_consume_ab_slots() {
        let mut c = course(ScheduleModel::Ab, None, None);
        // Thu 2024-09-05 through Tue 2024-09-10.
        c.school_year_start = d(2024, 9, 5);
        c.school_year_end = d(2024, 9, 10);
        let days = build_calendar(&c);
        assert_eq!(days.len(), 6);
        for day in days.iter().filter(|x| is_weekend(x.date)) {
            assert_eq!(day.day_type, DayType::Off);
            assert_eq!(day.ab_day, None);
        }
        let weekday_letters: Vec<_> = days
            .iter()
            .filter(|x| !is_weekend(x.date))
            .map(|x| x.ab_day)
            .collect();
        assert_eq!(
            weekday_letters,
            vec![Some(AbDay::A), Some(AbDay::B), Some(AbDay::A), Some(AbDay::B)]
        );
    }

    #[test]
    fn days_before_pattern_start_have_no_letter() {
        let days = build_calendar(&course(ScheduleModel::Ab, Some(AbDay::B), Some(d(2024, 9, 4))));
        assert_eq!(days[0].ab_day, None);
        assert_eq!(days[0].day_type, DayType::Instructional);
        assert_eq!(days[1].ab_day, None);
        assert_eq!(days[2].ab_day, Some(AbDay::A));
        assert_eq!(days[2].day_type, DayType::Off);
        assert_eq!(days[3].ab_day, Some(AbDay::B));
        assert_eq!(days[3].day_type, DayType::Instructional);
    }

    #[test]
    fn every_date_in_range_appears_exactly_once() {
        let mut c = course(ScheduleModel::EveryDay, None, None);
        c.school_year_start = d(2023, 8, 28);
        c.school_year_end = d(2024, 6, 14);
        let days = build_calendar(&c);
        let expected = (c.school_year_end - c.school_year_start).num_days() + 1;
        assert_eq!(days.len() as i64, expected);
        assert!(days.windows(2).all(|w| w[1].date == w[0].date.succ_opt().unwrap()));
        // Leap day is included.
        assert!(days.iter().any(|x| x.date == d(2024, 2, 29)));
    }

    #[test]
    fn generate_is_create_once_unless_forced() {
        let conn = Connection::open_in_memory().expect("open");
        let c = course(ScheduleModel::EveryDay, None, None);
        seed(&conn, &c);
        let store = SqliteStore::new(&conn);
        let actor = Actor::new("teacher-1");

        let first = generate(&store, &OwnerPolicy, &actor, &c.id, false).expect("first");
        assert!(first.was_generated());

        let edit = CalendarDayEdit {
            day_type: DayType::Half,
            reason_id: None,
            note: Some("assembly".into()),
        };
        update_day(&store, &OwnerPolicy, &actor, &c.id, d(2024, 9, 3), &edit).expect("edit");

        let second = generate(&store, &OwnerPolicy, &actor, &c.id, false).expect("second");
        assert!(!second.was_generated());
        assert_eq!(second.days()[1].day_type, DayType::Half);

        let forced = generate(&store, &OwnerPolicy, &actor, &c.id, true).expect("forced");
        assert!(forced.was_generated());
        let stored = store.calendar_days(&c.id).expect("days");
        assert_eq!(stored.len(), 5);
        assert_eq!(stored[1].day_type, DayType::Instructional);
        assert_eq!(stored[1].note, None);
    }

    #[test]
    fn foreign_and_missing_courses_are_distinct_errors() {
        let conn = Connection::open_in_memory().expect("open");
        let c = course(ScheduleModel::EveryDay, None, None);
        seed(&conn, &c);
        let store = SqliteStore::new(&conn);

        let e = generate(&store, &OwnerPolicy, &Actor::new("someone-else"), &c.id, false).unwrap_err();
        assert!(matches!(e, PlanError::Forbidden));
        let e = generate(&store, &OwnerPolicy, &Actor::new("teacher-1"), "nope", false).unwrap_err();
        assert!(matches!(e, PlanError::NotFound("course")));
        assert_eq!(store.calendar_day_count(&c.id).expect("count"), 0);
    }

    #[test]
    fn update_day_outside_calendar_is_not_found() {
        let conn = Connection::open_in_memory().expect("open");
        let c = course(ScheduleModel::EveryDay, None, None);
        seed(&conn, &c);
        let store = SqliteStore::new(&conn);
        let actor = Actor::new("teacher-1");
        generate(&store, &OwnerPolicy, &actor, &c.id, false).expect("generate");

        let edit = CalendarDayEdit {
            day_type: DayType::Off,
            reason_id: None,
            note: None,
        };
        let e = update_day(&store, &OwnerPolicy, &actor, &c.id, d(2024, 10, 1), &edit).unwrap_err();
        assert!(matches!(e, PlanError::NotFound("calendar day")));

        let bad_reason = CalendarDayEdit {
            reason_id: Some("missing-reason".into()),
            ..edit
        };
        let e = update_day(&store, &OwnerPolicy, &actor, &c.id, d(2024, 9, 3), &bad_reason).unwrap_err();
        assert!(matches!(e, PlanError::NotFound("reason")));
    }

    #[test]
    fn summary_counts_day_types() {
        let days = build_calendar(&course(ScheduleModel::Ab, Some(AbDay::A), Some(d(2024, 9, 2))));
        let s = CalendarSummary::of(&days);
        assert_eq!(s.total, 5);
        assert_eq!(s.instructional, 3);
        assert_eq!(s.off, 2);
        assert_eq!(s.half + s.modified, 0);
    }
}
