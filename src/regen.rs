/// How a generation stage treats the rows an earlier run produced.
///
/// Each stage has its own strategy and they are not interchangeable:
/// the calendar is created once (operator edits live on it), the pacing
/// plan is always rebuilt wholesale, and announcements are upserted per
/// date with optional pruning of dates that left the plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegenerationPolicy {
    GenerateOnce { force: bool },
    ReplaceAll,
    UpsertByDate { prune_stale: bool },
}

impl RegenerationPolicy {
    pub fn calendar(force: bool) -> Self {
        Self::GenerateOnce { force }
    }

    pub fn pacing() -> Self {
        Self::ReplaceAll
    }

    pub fn announcements(prune_stale: bool) -> Self {
        Self::UpsertByDate { prune_stale }
    }

    /// True when existing output must be left untouched.
    pub fn keeps_existing(self, existing_rows: usize) -> bool {
        matches!(self, Self::GenerateOnce { force: false }) && existing_rows > 0
    }

    /// True when every previous row is removed before new rows are written.
    pub fn clears_before_write(self) -> bool {
        match self {
            Self::GenerateOnce { force } => force,
            Self::ReplaceAll => true,
            Self::UpsertByDate { .. } => false,
        }
    }

    pub fn prunes_stale(self) -> bool {
        matches!(self, Self::UpsertByDate { prune_stale: true })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GenerateOnce { force: false } => "generate_once",
            Self::GenerateOnce { force: true } => "forced_replace",
            Self::ReplaceAll => "replace_all",
            Self::UpsertByDate { prune_stale: true } => "upsert_prune",
            Self::UpsertByDate { prune_stale: false } => "upsert",
        }
    }
}
