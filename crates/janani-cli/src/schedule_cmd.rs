//! `janani schedule` command: print the ANC test table.

use anyhow::{Result, bail};

use janani_core::schedule::{self, TestRecord, TrimesterSchedule};

/// Run the schedule command.
///
/// Without a week, prints every trimester. With a week, prints that week's
/// trimester and the tests due soon.
pub fn run_schedule(week: Option<u32>, json: bool) -> Result<()> {
    if week == Some(0) {
        bail!("week must be at least 1");
    }
    let output = match (week, json) {
        (None, false) => render_all(schedule::all_schedules()),
        (None, true) => serde_json::to_string_pretty(schedule::all_schedules())?,
        (Some(week), false) => render_week(week),
        (Some(week), true) => {
            let lookup = schedule::tests_for(week);
            serde_json::to_string_pretty(&serde_json::json!({
                "trimester": lookup.trimester,
                "weeks": lookup.weeks,
                "pregnancy_week": week,
                "tests": lookup.tests,
                "upcoming": schedule::upcoming_tests(week),
            }))?
        }
    };
    println!("{output}");
    Ok(())
}

fn render_all(schedules: &[TrimesterSchedule]) -> String {
    let mut lines = Vec::new();
    for (i, s) in schedules.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("{} (weeks {})", capitalize(s.trimester.label()), s.weeks));
        for test in &s.tests {
            push_test(&mut lines, test);
        }
    }
    lines.join("\n")
}

fn render_week(week: u32) -> String {
    let lookup = schedule::tests_for(week);
    let mut lines = vec![
        format!(
            "Week {week}: {} (weeks {})",
            lookup.trimester.label(),
            lookup.weeks
        ),
        String::new(),
        "Tests this trimester:".to_string(),
    ];
    for test in lookup.tests {
        push_test(&mut lines, test);
    }
    lines.push(String::new());
    let upcoming = schedule::upcoming_tests(week);
    if upcoming.is_empty() {
        lines.push("Nothing due right now beyond routine checks.".to_string());
    } else {
        lines.push("Due soon:".to_string());
        lines.extend(upcoming.iter().map(|test| format!("  * {}", test.name)));
    }
    lines.join("\n")
}

fn push_test(lines: &mut Vec<String>, test: &TestRecord) {
    lines.push(format!("  - {} [{}] ({})", test.name, test.timing, test.frequency));
    if let Some(range) = &test.normal_range {
        lines.push(format!("      normal: {range}"));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
