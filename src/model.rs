use crate::error::PlanError;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest school year a course may span, counted in calendar dates.
pub const MAX_SCHOOL_YEAR_DAYS: i64 = 366;

pub fn parse_iso_date(raw: &str, field: &str) -> Result<NaiveDate, PlanError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| PlanError::Validation(format!("{} must be a YYYY-MM-DD date", field)))
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleModel {
    EveryDay,
    Ab,
}

impl ScheduleModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EveryDay => "every_day",
            Self::Ab => "ab",
        }
    }
}

impl FromStr for ScheduleModel {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every_day" => Ok(Self::EveryDay),
            "ab" => Ok(Self::Ab),
            _ => Err(PlanError::Validation(
                "scheduleModel must be one of: every_day, ab".to_string(),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbDay {
    A,
    B,
}

impl AbDay {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl FromStr for AbDay {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            _ => Err(PlanError::Validation("A/B day must be A or B".to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayType {
    Instructional,
    Off,
    Half,
    Modified,
}

impl DayType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instructional => "instructional",
            Self::Off => "off",
            Self::Half => "half",
            Self::Modified => "modified",
        }
    }
}

impl FromStr for DayType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "instructional" => Ok(Self::Instructional),
            "off" => Ok(Self::Off),
            "half" => Ok(Self::Half),
            "modified" => Ok(Self::Modified),
            _ => Err(PlanError::Validation(
                "dayType must be one of: instructional, off, half, modified".to_string(),
            )),
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanStatus {
    Planned,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
        }
    }
}

impl FromStr for PlanStatus {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "planned" => Ok(Self::Planned),
            other => Err(PlanError::Validation(format!(
                "unknown lesson plan status: {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub class_name: String,
    pub selected_library_id: String,
    pub schedule_model: ScheduleModel,
    pub ab_meeting_day: Option<AbDay>,
    pub ab_pattern_start_date: Option<NaiveDate>,
    pub school_year_start: NaiveDate,
    pub school_year_end: NaiveDate,
}

impl Course {
    /// Whether a calendar day may receive a lesson under this course's schedule.
    pub fn is_eligible(&self, day: &CalendarDay) -> bool {
        if day.day_type != DayType::Instructional {
            return false;
        }
        match (self.schedule_model, self.ab_meeting_day) {
            (ScheduleModel::Ab, Some(meeting)) => day.ab_day == Some(meeting),
            _ => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub day_type: DayType,
    pub ab_day: Option<AbDay>,
    pub reason_id: Option<String>,
    pub note: Option<String>,
}

/// Operator override for a single calendar row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarDayEdit {
    pub day_type: DayType,
    pub reason_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurriculumLesson {
    pub id: String,
    pub library_id: String,
    pub sequence_index: i64,
    pub source_lesson_code: Option<String>,
    pub title: String,
    pub objective: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonPlanEntry {
    pub date: NaiveDate,
    pub lesson_id: String,
    pub status: PlanStatus,
    pub is_added_buffer_day: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncementRecord {
    pub date: NaiveDate,
    pub content: String,
    pub content_sha256: String,
    pub updated_at: String,
}
