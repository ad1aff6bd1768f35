use crate::access::{load_owned_course, AccessPolicy, Actor};
use crate::error::PlanError;
use crate::model::{AbDay, Course, ScheduleModel, MAX_SCHOOL_YEAR_DAYS};
use crate::store::{CourseSummary, SqliteStore};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

/// Course settings as submitted, before validation.
#[derive(Clone, Debug)]
pub struct CourseDraft {
    pub library_id: String,
    pub title: Option<String>,
    pub schedule_model: ScheduleModel,
    pub ab_meeting_day: Option<AbDay>,
    pub ab_pattern_start_date: Option<NaiveDate>,
    pub school_year_start: NaiveDate,
    pub school_year_end: NaiveDate,
}

fn check_school_year(start: NaiveDate, end: NaiveDate) -> Result<(), PlanError> {
    if end < start {
        return Err(PlanError::Validation(
            "schoolYearEnd must not be before schoolYearStart".to_string(),
        ));
    }
    let span = (end - start).num_days() + 1;
    if span > MAX_SCHOOL_YEAR_DAYS {
        return Err(PlanError::Validation(format!(
            "school year spans {} days; at most {} allowed",
            span, MAX_SCHOOL_YEAR_DAYS
        )));
    }
    Ok(())
}

pub fn create(store: &SqliteStore<'_>, actor: &Actor, draft: CourseDraft) -> Result<Course, PlanError> {
    check_school_year(draft.school_year_start, draft.school_year_end)?;
    let library = store
        .library(&draft.library_id)?
        .ok_or(PlanError::NotFound("library"))?;

    // A/B settings only mean something on an AB schedule.
    let (ab_meeting_day, ab_pattern_start_date) = match draft.schedule_model {
        ScheduleModel::Ab => (draft.ab_meeting_day, draft.ab_pattern_start_date),
        ScheduleModel::EveryDay => (None, None),
    };

    let title = draft
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| library.class_name.clone());

    let course = Course {
        id: Uuid::new_v4().to_string(),
        owner_id: actor.id.clone(),
        title,
        class_name: library.class_name,
        selected_library_id: library.id,
        schedule_model: draft.schedule_model,
        ab_meeting_day,
        ab_pattern_start_date,
        school_year_start: draft.school_year_start,
        school_year_end: draft.school_year_end,
    };
    store.insert_course(&course)?;
    info!(course_id = %course.id, owner = %actor.id, "course created");
    Ok(course)
}

pub fn list(store: &SqliteStore<'_>, actor: &Actor) -> Result<Vec<CourseSummary>, PlanError> {
    store.courses_for_owner(&actor.id)
}

pub fn delete(
    store: &SqliteStore<'_>,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<(), PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    store.delete_course(&course.id)?;
    info!(course_id = %course.id, "course deleted");
    Ok(())
}
