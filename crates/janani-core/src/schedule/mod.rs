//! Antenatal-care test schedule and week classification.
//!
//! The schedule is defined in `anc_schedule.toml` and embedded in the binary
//! at compile time. It is parsed once, on first use, and shared read-only
//! for the lifetime of the process.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Weeks past this are accepted but almost certainly a data-entry mistake.
pub const WEEK_SANITY_LIMIT: u32 = 42;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One of the three phases of pregnancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trimester {
    FirstTrimester,
    SecondTrimester,
    ThirdTrimester,
}

impl Trimester {
    /// Short spoken label, e.g. "second trimester".
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstTrimester => "first trimester",
            Self::SecondTrimester => "second trimester",
            Self::ThirdTrimester => "third trimester",
        }
    }
}

impl fmt::Display for Trimester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FirstTrimester => "first_trimester",
            Self::SecondTrimester => "second_trimester",
            Self::ThirdTrimester => "third_trimester",
        };
        f.write_str(s)
    }
}

impl FromStr for Trimester {
    type Err = TrimesterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_trimester" => Ok(Self::FirstTrimester),
            "second_trimester" => Ok(Self::SecondTrimester),
            "third_trimester" => Ok(Self::ThirdTrimester),
            other => Err(TrimesterParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Trimester`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid trimester: {0:?}")]
pub struct TrimesterParseError(pub String);

/// Inclusive range of pregnancy weeks covered by a trimester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRange {
    pub start: u32,
    pub end: u32,
    /// When set, weeks past `end` still belong to this range.
    #[serde(default)]
    pub open_ended: bool,
}

impl WeekRange {
    pub fn contains(&self, week: u32) -> bool {
        week >= self.start && (self.open_ended || week <= self.end)
    }
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)?;
        if self.open_ended {
            f.write_str("+")?;
        }
        Ok(())
    }
}

/// A single recommended test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub timing: String,
    pub frequency: String,
    /// Why the test matters, in plain words.
    pub why: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindi_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindi_timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_to_expect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_if_high: Option<String>,
}

impl TestRecord {
    /// Name in the caller's language, falling back to English.
    pub fn localized_name(&self, hindi: bool) -> &str {
        match (&self.hindi_name, hindi) {
            (Some(name), true) => name,
            _ => &self.name,
        }
    }

    /// Timing in the caller's language, falling back to English.
    pub fn localized_timing(&self, hindi: bool) -> &str {
        match (&self.hindi_timing, hindi) {
            (Some(timing), true) => timing,
            _ => &self.timing,
        }
    }
}

/// All tests recommended during one trimester, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimesterSchedule {
    pub trimester: Trimester,
    pub weeks: WeekRange,
    pub tests: Vec<TestRecord>,
}

/// Result of looking up the schedule for a given week.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleLookup {
    pub trimester: Trimester,
    pub weeks: WeekRange,
    pub tests: &'static [TestRecord],
    pub pregnancy_week: u32,
}

// ---------------------------------------------------------------------------
// Embedded table
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScheduleLibrary {
    trimesters: Vec<TrimesterSchedule>,
}

static SCHEDULE_TOML: &str = include_str!("anc_schedule.toml");

/// The embedded table is a compile-time invariant: if the binary was built,
/// the TOML is valid.
static SCHEDULE: LazyLock<Vec<TrimesterSchedule>> = LazyLock::new(|| {
    let lib: ScheduleLibrary =
        toml::from_str(SCHEDULE_TOML).expect("embedded anc_schedule.toml is invalid");
    lib.trimesters
});

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Determine the trimester for a pregnancy week.
///
/// Weeks up to 13 are first trimester, 14 through 26 second, and anything
/// later third. There is no upper bound: week 60 is still third trimester.
pub fn classify(week: u32) -> Trimester {
    if week <= 13 {
        Trimester::FirstTrimester
    } else if week <= 26 {
        Trimester::SecondTrimester
    } else {
        Trimester::ThirdTrimester
    }
}

/// The whole schedule, first trimester first.
pub fn all_schedules() -> &'static [TrimesterSchedule] {
    &SCHEDULE
}

/// Schedule for one trimester.
pub fn schedule_for(trimester: Trimester) -> &'static TrimesterSchedule {
    SCHEDULE
        .iter()
        .find(|s| s.trimester == trimester)
        .expect("embedded schedule covers every trimester")
}

/// Tests recommended at the given week.
pub fn tests_for(week: u32) -> ScheduleLookup {
    if week > WEEK_SANITY_LIMIT {
        tracing::warn!(week, "pregnancy week beyond {WEEK_SANITY_LIMIT}, treating as third trimester");
    }
    let schedule = schedule_for(classify(week));
    ScheduleLookup {
        trimester: schedule.trimester,
        weeks: schedule.weeks,
        tests: &schedule.tests,
        pregnancy_week: week,
    }
}

/// Tests that should be done soon at the given week.
///
/// Tests repeated every visit are always due. Early in the first trimester
/// (up to week 12) the whole booking panel is due. Around the anomaly-scan
/// window (weeks 18 to 22) the tests timed near week 20 are due.
pub fn upcoming_tests(week: u32) -> Vec<&'static TestRecord> {
    let trimester = classify(week);
    schedule_for(trimester)
        .tests
        .iter()
        .filter(|test| {
            if test.frequency.contains("Every visit") {
                true
            } else if trimester == Trimester::FirstTrimester && week <= 12 {
                true
            } else {
                trimester == Trimester::SecondTrimester
                    && test.timing.contains("20")
                    && (18..=22).contains(&week)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
