use crate::error::PlanError;
use crate::model::{
    format_iso_date, AnnouncementRecord, CalendarDay, CalendarDayEdit, Course, CurriculumLesson,
    LessonPlanEntry, DATE_FORMAT,
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// Per-course data access used by the generation stages.
///
/// Every write method is a single atomic batch: either all rows for the
/// course change together or nothing does.
pub trait PlannerStore {
    fn course(&self, course_id: &str) -> Result<Option<Course>, PlanError>;

    fn calendar_day_count(&self, course_id: &str) -> Result<usize, PlanError>;
    fn calendar_days(&self, course_id: &str) -> Result<Vec<CalendarDay>, PlanError>;
    /// Inserts `days` only if the course has no calendar yet. Returns false when rows already existed.
    fn create_calendar_if_absent(&self, course_id: &str, days: &[CalendarDay]) -> Result<bool, PlanError>;
    fn replace_calendar(&self, course_id: &str, days: &[CalendarDay]) -> Result<(), PlanError>;
    /// Returns false when no row exists for that date.
    fn update_calendar_day(
        &self,
        course_id: &str,
        date: NaiveDate,
        edit: &CalendarDayEdit,
    ) -> Result<bool, PlanError>;
    fn reason_visible(&self, owner_id: &str, reason_id: &str) -> Result<bool, PlanError>;

    fn library_lessons(&self, library_id: &str) -> Result<Vec<CurriculumLesson>, PlanError>;
    fn lessons_by_ids(&self, lesson_ids: &[String]) -> Result<Vec<CurriculumLesson>, PlanError>;
    /// `(lesson_id, standard_code)` pairs in link order.
    fn standard_codes(&self, lesson_ids: &[String]) -> Result<Vec<(String, String)>, PlanError>;

    fn lesson_plan(&self, course_id: &str) -> Result<Vec<LessonPlanEntry>, PlanError>;
    /// Rebuilds the plan in one write transaction. `assign` sees the calendar
    /// and the library's lessons as they stand under the lock, and its output
    /// replaces every earlier plan row.
    fn rebuild_lesson_plan(
        &self,
        course_id: &str,
        library_id: &str,
        assign: &mut dyn FnMut(&[CalendarDay], &[CurriculumLesson]) -> Vec<LessonPlanEntry>,
    ) -> Result<Vec<LessonPlanEntry>, PlanError>;

    fn announcements(&self, course_id: &str) -> Result<Vec<AnnouncementRecord>, PlanError>;
    /// Recomposes announcements in one write transaction. The records `compose`
    /// returns are upserted by date; with `prune_stale` every other date is
    /// deleted. Returns the written records and the number of pruned rows.
    fn rebuild_announcements(
        &self,
        course_id: &str,
        prune_stale: bool,
        compose: &mut dyn FnMut(AnnouncementSources) -> Vec<AnnouncementRecord>,
    ) -> Result<(Vec<AnnouncementRecord>, usize), PlanError>;
}

pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.trim().is_empty() => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|e| conversion_err(idx, e)),
        _ => Ok(None),
    }
}

fn enum_col<T: FromStr<Err = PlanError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn opt_enum_col<T: FromStr<Err = PlanError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| conversion_err(idx, e)),
        _ => Ok(None),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    // IMMEDIATE takes the write lock up front so concurrent regenerations serialize.
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

fn insert_calendar_rows(tx: &Transaction<'_>, course_id: &str, days: &[CalendarDay]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO course_calendar_days(course_id, class_date, day_type, ab_day, reason_id, note)
         VALUES(?, ?, ?, ?, ?, ?)",
    )?;
    for day in days {
        stmt.execute(params![
            course_id,
            format_iso_date(day.date),
            day.day_type.as_str(),
            day.ab_day.map(|d| d.as_str()),
            day.reason_id,
            day.note,
        ])?;
    }
    Ok(())
}

/// Everything an announcement batch is composed from.
#[derive(Debug, Default)]
pub struct AnnouncementSources {
    pub plan: Vec<LessonPlanEntry>,
    pub lessons: Vec<CurriculumLesson>,
    /// `(lesson_id, standard_code)` pairs in link order.
    pub standard_links: Vec<(String, String)>,
    pub previous: Vec<AnnouncementRecord>,
}

#[derive(Clone, Debug)]
pub struct LibrarySummary {
    pub id: String,
    pub provider: String,
    pub class_code: String,
    pub class_name: String,
    pub lesson_count: i64,
}

#[derive(Clone, Debug)]
pub struct CourseSummary {
    pub course: Course,
    pub calendar_days: i64,
    pub planned_lessons: i64,
    pub announcements: i64,
}

#[derive(Clone, Debug)]
pub struct DayOffReason {
    pub id: String,
    pub owner_id: Option<String>,
    pub label: String,
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_course(&self, course: &Course) -> Result<(), PlanError> {
        self.conn.execute(
            "INSERT INTO courses(
               id, owner_id, title, class_name, selected_library_id, schedule_model,
               ab_meeting_day, ab_pattern_start_date, school_year_start, school_year_end, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                course.id,
                course.owner_id,
                course.title,
                course.class_name,
                course.selected_library_id,
                course.schedule_model.as_str(),
                course.ab_meeting_day.map(|d| d.as_str()),
                course.ab_pattern_start_date.map(format_iso_date),
                format_iso_date(course.school_year_start),
                format_iso_date(course.school_year_end),
                now_ts(),
            ],
        )?;
        Ok(())
    }

    pub fn courses_for_owner(&self, owner_id: &str) -> Result<Vec<CourseSummary>, PlanError> {
        let mut stmt = self.conn.prepare(
            "SELECT
               c.id, c.owner_id, c.title, c.class_name, c.selected_library_id, c.schedule_model,
               c.ab_meeting_day, c.ab_pattern_start_date, c.school_year_start, c.school_year_end,
               (SELECT COUNT(*) FROM course_calendar_days d WHERE d.course_id = c.id),
               (SELECT COUNT(*) FROM course_lesson_plan p WHERE p.course_id = c.id),
               (SELECT COUNT(*) FROM course_announcements a WHERE a.course_id = c.id)
             FROM courses c
             WHERE c.owner_id = ?
             ORDER BY c.created_at, c.title",
        )?;
        let rows = stmt
            .query_map([owner_id], |r| {
                Ok(CourseSummary {
                    course: course_from_row(r)?,
                    calendar_days: r.get(10)?,
                    planned_lessons: r.get(11)?,
                    announcements: r.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes a course and everything derived from it.
    pub fn delete_course(&self, course_id: &str) -> Result<(), PlanError> {
        let tx = begin_write(self.conn)?;
        // Dependency order; the schema has no ON DELETE CASCADE.
        tx.execute("DELETE FROM course_announcements WHERE course_id = ?", [course_id])?;
        tx.execute("DELETE FROM course_lesson_plan WHERE course_id = ?", [course_id])?;
        tx.execute("DELETE FROM course_calendar_days WHERE course_id = ?", [course_id])?;
        tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn library(&self, library_id: &str) -> Result<Option<LibrarySummary>, PlanError> {
        let row = self
            .conn
            .query_row(
                "SELECT l.id, l.provider, l.class_code, l.class_name,
                   (SELECT COUNT(*) FROM curriculum_lessons x WHERE x.library_id = l.id)
                 FROM curriculum_libraries l
                 WHERE l.id = ?",
                [library_id],
                library_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn libraries(&self) -> Result<Vec<LibrarySummary>, PlanError> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.provider, l.class_code, l.class_name,
               (SELECT COUNT(*) FROM curriculum_lessons x WHERE x.library_id = l.id)
             FROM curriculum_libraries l
             ORDER BY l.provider, l.class_code",
        )?;
        let rows = stmt
            .query_map([], library_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn reasons_for_owner(&self, owner_id: &str) -> Result<Vec<DayOffReason>, PlanError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, label
             FROM day_off_reasons
             WHERE owner_id IS NULL OR owner_id = ?
             ORDER BY label, id",
        )?;
        let rows = stmt
            .query_map([owner_id], |r| {
                Ok(DayOffReason {
                    id: r.get(0)?,
                    owner_id: r.get(1)?,
                    label: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create_reason(&self, owner_id: &str, label: &str) -> Result<DayOffReason, PlanError> {
        let reason = DayOffReason {
            id: Uuid::new_v4().to_string(),
            owner_id: Some(owner_id.to_string()),
            label: label.to_string(),
        };
        self.conn.execute(
            "INSERT INTO day_off_reasons(id, owner_id, label) VALUES(?, ?, ?)",
            params![reason.id, reason.owner_id, reason.label],
        )?;
        Ok(reason)
    }
}

fn library_from_row(r: &Row<'_>) -> rusqlite::Result<LibrarySummary> {
    Ok(LibrarySummary {
        id: r.get(0)?,
        provider: r.get(1)?,
        class_code: r.get(2)?,
        class_name: r.get(3)?,
        lesson_count: r.get(4)?,
    })
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        title: r.get(2)?,
        class_name: r.get(3)?,
        selected_library_id: r.get(4)?,
        schedule_model: enum_col(r, 5)?,
        ab_meeting_day: opt_enum_col(r, 6)?,
        ab_pattern_start_date: opt_date_col(r, 7)?,
        school_year_start: date_col(r, 8)?,
        school_year_end: date_col(r, 9)?,
    })
}

fn lesson_from_row(r: &Row<'_>) -> rusqlite::Result<CurriculumLesson> {
    Ok(CurriculumLesson {
        id: r.get(0)?,
        library_id: r.get(1)?,
        sequence_index: r.get(2)?,
        source_lesson_code: r.get(3)?,
        title: r.get(4)?,
        objective: r.get(5)?,
    })
}

fn read_calendar_days(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<CalendarDay>> {
    let mut stmt = conn.prepare(
        "SELECT class_date, day_type, ab_day, reason_id, note
         FROM course_calendar_days
         WHERE course_id = ?
         ORDER BY class_date",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(CalendarDay {
                date: date_col(r, 0)?,
                day_type: enum_col(r, 1)?,
                ab_day: opt_enum_col(r, 2)?,
                reason_id: r.get(3)?,
                note: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_library_lessons(conn: &Connection, library_id: &str) -> rusqlite::Result<Vec<CurriculumLesson>> {
    let mut stmt = conn.prepare(
        "SELECT id, library_id, sequence_index, source_lesson_code, title, objective
         FROM curriculum_lessons
         WHERE library_id = ?
         ORDER BY sequence_index",
    )?;
    let rows = stmt
        .query_map([library_id], lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_lessons_by_ids(conn: &Connection, lesson_ids: &[String]) -> rusqlite::Result<Vec<CurriculumLesson>> {
    if lesson_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, library_id, sequence_index, source_lesson_code, title, objective
         FROM curriculum_lessons
         WHERE id IN ({})",
        placeholders(lesson_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let bind = lesson_ids.iter().map(|id| Value::Text(id.clone()));
    let rows = stmt
        .query_map(params_from_iter(bind), lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_standard_codes(conn: &Connection, lesson_ids: &[String]) -> rusqlite::Result<Vec<(String, String)>> {
    if lesson_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT ls.lesson_id, s.code
         FROM curriculum_lesson_standards ls
         JOIN standards s ON s.id = ls.standard_id
         WHERE ls.lesson_id IN ({})
         ORDER BY ls.lesson_id, ls.link_order",
        placeholders(lesson_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let bind = lesson_ids.iter().map(|id| Value::Text(id.clone()));
    let rows = stmt
        .query_map(params_from_iter(bind), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_lesson_plan(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<LessonPlanEntry>> {
    let mut stmt = conn.prepare(
        "SELECT class_date, lesson_id, status, is_added_buffer_day
         FROM course_lesson_plan
         WHERE course_id = ?
         ORDER BY class_date",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(LessonPlanEntry {
                date: date_col(r, 0)?,
                lesson_id: r.get(1)?,
                status: enum_col(r, 2)?,
                is_added_buffer_day: r.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_announcements(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<AnnouncementRecord>> {
    let mut stmt = conn.prepare(
        "SELECT class_date, content, content_sha256, updated_at
         FROM course_announcements
         WHERE course_id = ?
         ORDER BY class_date",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(AnnouncementRecord {
                date: date_col(r, 0)?,
                content: r.get(1)?,
                content_sha256: r.get(2)?,
                updated_at: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn write_plan_rows(tx: &Transaction<'_>, course_id: &str, entries: &[LessonPlanEntry]) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM course_lesson_plan WHERE course_id = ?", [course_id])?;
    let mut stmt = tx.prepare(
        "INSERT INTO course_lesson_plan(course_id, class_date, lesson_id, status, is_added_buffer_day)
         VALUES(?, ?, ?, ?, ?)",
    )?;
    for entry in entries {
        stmt.execute(params![
            course_id,
            format_iso_date(entry.date),
            entry.lesson_id,
            entry.status.as_str(),
            entry.is_added_buffer_day as i64,
        ])?;
    }
    Ok(())
}

/// Upserts `records` by date and, when pruning, deletes the course's other dates.
fn write_announcement_rows(
    tx: &Transaction<'_>,
    course_id: &str,
    records: &[AnnouncementRecord],
    prune_stale: bool,
) -> rusqlite::Result<usize> {
    {
        let mut stmt = tx.prepare(
            "INSERT INTO course_announcements(course_id, class_date, content, content_sha256, updated_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(course_id, class_date) DO UPDATE SET
               content = excluded.content,
               content_sha256 = excluded.content_sha256,
               updated_at = excluded.updated_at",
        )?;
        for rec in records {
            stmt.execute(params![
                course_id,
                format_iso_date(rec.date),
                rec.content,
                rec.content_sha256,
                rec.updated_at,
            ])?;
        }
    }
    if !prune_stale {
        return Ok(0);
    }

    let keep: HashSet<String> = records.iter().map(|r| format_iso_date(r.date)).collect();
    let existing: Vec<String> = {
        let mut stmt = tx.prepare("SELECT class_date FROM course_announcements WHERE course_id = ?")?;
        let rows = stmt.query_map([course_id], |r| r.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    let mut pruned = 0usize;
    for date in existing.iter().filter(|d| !keep.contains(*d)) {
        pruned += tx.execute(
            "DELETE FROM course_announcements WHERE course_id = ? AND class_date = ?",
            params![course_id, date],
        )?;
    }
    Ok(pruned)
}

impl PlannerStore for SqliteStore<'_> {
    fn course(&self, course_id: &str) -> Result<Option<Course>, PlanError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, owner_id, title, class_name, selected_library_id, schedule_model,
                   ab_meeting_day, ab_pattern_start_date, school_year_start, school_year_end
                 FROM courses
                 WHERE id = ?",
                [course_id],
                course_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn calendar_day_count(&self, course_id: &str) -> Result<usize, PlanError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM course_calendar_days WHERE course_id = ?",
            [course_id],
            |r| r.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    fn calendar_days(&self, course_id: &str) -> Result<Vec<CalendarDay>, PlanError> {
        Ok(read_calendar_days(self.conn, course_id)?)
    }

    fn create_calendar_if_absent(&self, course_id: &str, days: &[CalendarDay]) -> Result<bool, PlanError> {
        let tx = begin_write(self.conn)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM course_calendar_days WHERE course_id = ?",
            [course_id],
            |r| r.get(0),
        )?;
        if existing > 0 {
            tx.rollback()?;
            return Ok(false);
        }
        insert_calendar_rows(&tx, course_id, days)?;
        tx.commit()?;
        Ok(true)
    }

    fn replace_calendar(&self, course_id: &str, days: &[CalendarDay]) -> Result<(), PlanError> {
        let tx = begin_write(self.conn)?;
        tx.execute(
            "DELETE FROM course_calendar_days WHERE course_id = ?",
            [course_id],
        )?;
        insert_calendar_rows(&tx, course_id, days)?;
        tx.commit()?;
        Ok(())
    }

    fn update_calendar_day(
        &self,
        course_id: &str,
        date: NaiveDate,
        edit: &CalendarDayEdit,
    ) -> Result<bool, PlanError> {
        let changed = self.conn.execute(
            "UPDATE course_calendar_days
             SET day_type = ?, reason_id = ?, note = ?, updated_at = ?
             WHERE course_id = ? AND class_date = ?",
            params![
                edit.day_type.as_str(),
                edit.reason_id,
                edit.note,
                now_ts(),
                course_id,
                format_iso_date(date),
            ],
        )?;
        Ok(changed > 0)
    }

    fn reason_visible(&self, owner_id: &str, reason_id: &str) -> Result<bool, PlanError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM day_off_reasons WHERE id = ? AND (owner_id IS NULL OR owner_id = ?)",
                params![reason_id, owner_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn library_lessons(&self, library_id: &str) -> Result<Vec<CurriculumLesson>, PlanError> {
        Ok(read_library_lessons(self.conn, library_id)?)
    }

    fn lessons_by_ids(&self, lesson_ids: &[String]) -> Result<Vec<CurriculumLesson>, PlanError> {
        Ok(read_lessons_by_ids(self.conn, lesson_ids)?)
    }

    fn standard_codes(&self, lesson_ids: &[String]) -> Result<Vec<(String, String)>, PlanError> {
        Ok(read_standard_codes(self.conn, lesson_ids)?)
    }

    fn lesson_plan(&self, course_id: &str) -> Result<Vec<LessonPlanEntry>, PlanError> {
        Ok(read_lesson_plan(self.conn, course_id)?)
    }

    fn rebuild_lesson_plan(
        &self,
        course_id: &str,
        library_id: &str,
        assign: &mut dyn FnMut(&[CalendarDay], &[CurriculumLesson]) -> Vec<LessonPlanEntry>,
    ) -> Result<Vec<LessonPlanEntry>, PlanError> {
        let tx = begin_write(self.conn)?;
        let days = read_calendar_days(&tx, course_id)?;
        let lessons = read_library_lessons(&tx, library_id)?;
        let entries = assign(&days, &lessons);
        write_plan_rows(&tx, course_id, &entries)?;
        tx.commit()?;
        Ok(entries)
    }

    fn announcements(&self, course_id: &str) -> Result<Vec<AnnouncementRecord>, PlanError> {
        Ok(read_announcements(self.conn, course_id)?)
    }

    fn rebuild_announcements(
        &self,
        course_id: &str,
        prune_stale: bool,
        compose: &mut dyn FnMut(AnnouncementSources) -> Vec<AnnouncementRecord>,
    ) -> Result<(Vec<AnnouncementRecord>, usize), PlanError> {
        let tx = begin_write(self.conn)?;
        let plan = read_lesson_plan(&tx, course_id)?;
        let lesson_ids: Vec<String> = {
            let mut seen = HashSet::new();
            plan.iter()
                .filter(|e| seen.insert(e.lesson_id.as_str()))
                .map(|e| e.lesson_id.clone())
                .collect()
        };
        let sources = AnnouncementSources {
            lessons: read_lessons_by_ids(&tx, &lesson_ids)?,
            standard_links: read_standard_codes(&tx, &lesson_ids)?,
            previous: read_announcements(&tx, course_id)?,
            plan,
        };
        let records = compose(sources);
        let pruned = write_announcement_rows(&tx, course_id, &records, prune_stale)?;
        tx.commit()?;
        Ok((records, pruned))
    }
}
