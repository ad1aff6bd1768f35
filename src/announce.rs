use crate::access::{load_owned_course, AccessPolicy, Actor};
use crate::error::PlanError;
use crate::model::{AnnouncementRecord, Course, CurriculumLesson};
use crate::regen::RegenerationPolicy;
use crate::store::{now_ts, AnnouncementSources, PlannerStore};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

pub const LESSON_FALLBACK: &str = "TBD";
pub const OBJECTIVE_FALLBACK: &str = "No objective provided.";
pub const STANDARDS_FALLBACK: &str = "None listed";

/// Renders the four-line announcement for one class date.
pub fn render_announcement(
    date: NaiveDate,
    title: Option<&str>,
    objective: Option<&str>,
    standards: &[String],
) -> String {
    let title = title.filter(|s| !s.is_empty()).unwrap_or(LESSON_FALLBACK);
    let objective = objective.filter(|s| !s.is_empty()).unwrap_or(OBJECTIVE_FALLBACK);
    let standards = if standards.is_empty() {
        STANDARDS_FALLBACK.to_string()
    } else {
        standards.join(", ")
    };
    [
        format!("Date: {}", date.format("%a, %b %-d, %Y")),
        format!("Lesson: {}", title),
        format!("Objective: {}", objective),
        format!("Standards: {}", standards),
    ]
    .join("\n")
}

pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Groups `(lesson_id, code)` links per lesson, dropping repeated codes but keeping first-seen order.
pub fn group_standard_codes(links: Vec<(String, String)>) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (lesson_id, code) in links {
        let code = code.trim().to_string();
        if code.is_empty() {
            continue;
        }
        let codes = out.entry(lesson_id).or_default();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    out
}

#[derive(Debug)]
pub struct ComposeOutcome {
    pub records: Vec<AnnouncementRecord>,
    /// Records whose text is new or differs from what was stored.
    pub changed: usize,
    pub pruned: usize,
}

/// Renders one record per plan entry from sources read under the write lock.
pub fn compose_records(sources: &AnnouncementSources, updated_at: &str) -> Vec<AnnouncementRecord> {
    let lessons: HashMap<&str, &CurriculumLesson> =
        sources.lessons.iter().map(|l| (l.id.as_str(), l)).collect();
    let standards = group_standard_codes(sources.standard_links.clone());
    let no_codes = Vec::new();
    sources
        .plan
        .iter()
        .map(|entry| {
            let lesson = lessons.get(entry.lesson_id.as_str());
            let content = render_announcement(
                entry.date,
                lesson.map(|l| l.title.as_str()),
                lesson.map(|l| l.objective.as_str()),
                standards.get(&entry.lesson_id).unwrap_or(&no_codes),
            );
            AnnouncementRecord {
                date: entry.date,
                content_sha256: content_digest(&content),
                content,
                updated_at: updated_at.to_string(),
            }
        })
        .collect()
}

fn count_changed(previous: &[AnnouncementRecord], records: &[AnnouncementRecord]) -> usize {
    let previous: HashMap<NaiveDate, &str> = previous
        .iter()
        .map(|r| (r.date, r.content_sha256.as_str()))
        .collect();
    records
        .iter()
        .filter(|r| previous.get(&r.date) != Some(&r.content_sha256.as_str()))
        .count()
}

pub fn compose(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
    prune_stale: bool,
) -> Result<ComposeOutcome, PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let policy = RegenerationPolicy::announcements(prune_stale);

    let updated_at = now_ts();
    let mut changed = 0;
    let (records, pruned) = store.rebuild_announcements(
        &course.id,
        policy.prunes_stale(),
        &mut |sources| {
            let records = compose_records(&sources, &updated_at);
            changed = count_changed(&sources.previous, &records);
            records
        },
    )?;

    info!(
        course_id = %course.id,
        records = records.len(),
        changed,
        pruned,
        policy = policy.label(),
        "announcements composed"
    );
    Ok(ComposeOutcome {
        records,
        changed,
        pruned,
    })
}

pub fn list(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<(Course, Vec<AnnouncementRecord>), PlanError> {
    let course = load_owned_course(store, access, actor, course_id)?;
    let records = store.announcements(&course.id)?;
    Ok((course, records))
}
