//! Human-readable rollout reports.

use poolgate_state::{format_epoch, PhaseMetrics, RolloutState};

use crate::controller::Progress;
use crate::selector;
use crate::validator::ValidationReport;

pub const NO_ROLLOUT: &str = "No active rollout.";

const RULE: &str = "════════════════════════════════════════════\n";

/// Open phases are timed up to `now`, closed ones up to their end.
pub fn progress_report(progress: Option<&Progress>, now: u64) -> String {
    let Some(p) = progress else {
        return format!("{NO_ROLLOUT}\n");
    };
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str(&format!("  Rollout {}\n", p.rollout_id));
    out.push_str(RULE);
    out.push_str(&format!("Status:     {}\n", p.status));
    out.push_str(&format!("Phase:      {} ({:.0}%)\n", p.current_phase, p.progress_percent));
    out.push_str(&format!(
        "Pools:      original {} / target {} / active {}\n",
        p.original_pool_size, p.new_pool_size, p.active_pool_size
    ));
    out.push_str(&format!("Created:    {}\n", format_epoch(p.created_at)));
    out.push_str(&format!("Updated:    {}\n", format_epoch(p.updated_at)));

    if p.consecutive_errors > 0 {
        out.push_str(&format!("Consecutive errors: {}\n", p.consecutive_errors));
    }
    if let Some(err) = &p.last_error {
        out.push_str(&format!("Last error: {err}\n"));
    }

    if !p.phase_history.is_empty() {
        out.push_str("\nPhase history:\n");
        for m in &p.phase_history {
            let marker = if m.is_open() { "→" } else { "✓" };
            out.push_str(&format!(
                "  {marker} {:<14} {:>5} items  success {:>5.1}%  {:.1}h\n",
                m.phase.as_str(),
                m.stocks_count,
                m.success_rate(),
                m.duration_hours(now)
            ));
        }
    }

    out
}

pub fn phase_report(metrics: &PhaseMetrics, now: u64) -> String {
    let mut out = String::new();

    let state = if metrics.is_open() { "open" } else { "closed" };
    out.push_str(&format!("Phase {} ({state})\n", metrics.phase));
    out.push_str(&format!("  Started:   {}\n", format_epoch(metrics.start_time)));
    if let Some(end) = metrics.end_time {
        out.push_str(&format!("  Ended:     {}\n", format_epoch(end)));
    }
    out.push_str(&format!("  Duration:  {:.1}h\n", metrics.duration_hours(now)));
    out.push_str(&format!("  Items:     {}\n", metrics.stocks_count));
    out.push_str(&format!(
        "  Outcomes:  {} ok / {} errors / {} warnings\n",
        metrics.success_count, metrics.error_count, metrics.warning_count
    ));
    out.push_str(&format!(
        "  Rates:     success {:.1}% / error {:.1}%\n",
        metrics.success_rate(),
        metrics.error_rate()
    ));
    out.push_str(&format!(
        "  Scores:    data quality {:.1} / performance {:.1} / feedback {:.1}\n",
        metrics.data_quality_score, metrics.performance_score, metrics.user_feedback_score
    ));

    out
}

pub fn summary_report(state: Option<&RolloutState>, now: u64) -> String {
    let Some(s) = state else {
        return format!("{NO_ROLLOUT}\n");
    };
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str(&format!("  Rollout summary: {}\n", s.rollout_id));
    out.push_str(RULE);
    out.push_str(&format!("Status: {} at {}\n", s.status, s.current_phase));
    out.push_str(&format!(
        "Period: {} → {}\n\n",
        format_epoch(s.created_at),
        format_epoch(s.updated_at)
    ));

    let added = selector::added_items(&s.original_pool, &s.target_pool);
    out.push_str("Pool changes:\n");
    out.push_str(&format!("  original  {}\n", s.original_pool.len()));
    out.push_str(&format!("  target    {} (+{} new)\n", s.target_pool.len(), added.len()));
    out.push_str(&format!("  active    {}\n\n", s.active_pool.len()));

    if !s.phase_history.is_empty() {
        out.push_str("Phases:\n");
        for m in &s.phase_history {
            out.push_str(&format!(
                "  {:<14} {:>5.1}h  {:>4} ok {:>4} err {:>4} warn  success {:.1}%\n",
                m.phase.as_str(),
                m.duration_hours(now),
                m.success_count,
                m.error_count,
                m.warning_count,
                m.success_rate()
            ));
        }
        out.push('\n');
    }

    let success: u32 = s.phase_history.iter().map(|m| m.success_count).sum();
    let errors: u32 = s.phase_history.iter().map(|m| m.error_count).sum();
    let warnings: u32 = s.phase_history.iter().map(|m| m.warning_count).sum();
    let overall = match success + errors {
        0 => 100.0,
        total => f64::from(success) / f64::from(total) * 100.0,
    };
    out.push_str(&format!(
        "Totals: {success} ok / {errors} errors / {warnings} warnings (success {overall:.1}%)\n"
    ));
    if let Some(err) = &s.last_error {
        out.push_str(&format!("Last error: {err}\n"));
    }

    out
}

pub fn validation_report(report: &ValidationReport) -> String {
    let mut out = String::new();

    let verdict = if report.passed { "PASSED" } else { "FAILED" };
    out.push_str(&format!(
        "Validation of {} at {}: {verdict}\n",
        report.rollout_id, report.phase
    ));
    for check in &report.checks {
        let marker = if check.passed { "✅" } else { "❌" };
        out.push_str(&format!("  {marker} {:<18} {}\n", check.name, check.message));
    }

    out
}
