use crate::access::{load_owned_course, AccessPolicy, Actor};
use crate::error::PlanError;
use crate::model::{CalendarDay, Course, CurriculumLesson, LessonPlanEntry, PlanStatus};
use crate::regen::RegenerationPolicy;
use crate::store::PlannerStore;
use std::collections::HashMap;
use tracing::info;

/// Positional zip of eligible days and lessons, both already in ascending order.
///
/// Whichever side is longer keeps its surplus unassigned. Buffer days are
/// never inserted; `is_added_buffer_day` stays false.
pub fn assign_lessons(
    course: &Course,
    days: &[CalendarDay],
    lessons: &[CurriculumLesson],
) -> Vec<LessonPlanEntry> {
    days.iter()
        .filter(|day| course.is_eligible(day))
        .zip(lessons.iter())
        .map(|(day, lesson)| LessonPlanEntry {
            date: day.date,
            lesson_id: lesson.id.clone(),
            status: PlanStatus::Planned,
            is_added_buffer_day: false,
        })
        .collect()
}

pub fn assign(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<Vec<LessonPlanEntry>, PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let policy = RegenerationPolicy::pacing();

    let mut lesson_count = 0;
    let entries = store.rebuild_lesson_plan(
        &course.id,
        &course.selected_library_id,
        &mut |days, lessons| {
            lesson_count = lessons.len();
            assign_lessons(&course, days, lessons)
        },
    )?;

    info!(
        course_id = %course.id,
        planned = entries.len(),
        lessons = lesson_count,
        policy = policy.label(),
        "pacing plan generated"
    );
    Ok(entries)
}

/// Display label for a lesson: `"<code>: <title>"` unless the title already carries the code.
pub fn lesson_label(source_lesson_code: Option<&str>, title: &str) -> String {
    let title = title.trim();
    let title = if title.is_empty() { "Untitled Lesson" } else { title };
    let Some(code) = source_lesson_code.map(str::trim).filter(|c| !c.is_empty()) else {
        return title.to_string();
    };
    let prefix = format!("{}:", code.to_lowercase());
    if title.to_lowercase().starts_with(&prefix) {
        return title.to_string();
    }
    format!("{}: {}", code, title)
}

#[derive(Clone, Debug)]
pub struct PlanRow {
    pub entry: LessonPlanEntry,
    pub lesson: Option<CurriculumLesson>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanCounts {
    pub eligible_days: usize,
    pub library_lessons: usize,
    pub planned: usize,
}

pub struct PlanView {
    pub course: Course,
    pub rows: Vec<PlanRow>,
    pub counts: PlanCounts,
}

pub fn list(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<PlanView, PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let entries = store.lesson_plan(&course.id)?;
    let days = store.calendar_days(&course.id)?;
    let library = store.library_lessons(&course.selected_library_id)?;

    let eligible_days = days.iter().filter(|d| course.is_eligible(d)).count();
    let by_id: HashMap<&str, &CurriculumLesson> =
        library.iter().map(|l| (l.id.as_str(), l)).collect();
    let rows = entries
        .into_iter()
        .map(|entry| {
            let lesson = by_id.get(entry.lesson_id.as_str()).map(|l| (*l).clone());
            PlanRow { entry, lesson }
        })
        .collect::<Vec<_>>();

    let counts = PlanCounts {
        eligible_days,
        library_lessons: library.len(),
        planned: rows.len(),
    };
    Ok(PlanView {
        course,
        rows,
        counts,
    })
}
