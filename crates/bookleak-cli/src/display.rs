//! Console rendering of a finished run.
//!
//! Every section is built as a `String` so the layout can be checked without
//! capturing stdout.

use std::fmt::Write as _;

use bookleak_analysis::RunSummary;
use bookleak_core::{DeviationGroup, OpeningStats, ResultSummary, Score, Tally, format_summary};

// ── Helpers ──

fn score(score: &Score) -> String {
    match score.mate {
        Some(n) => format!("#{n}"),
        None => format!("{:+.2}", f64::from(score.cp) / 100.0),
    }
}

fn pawns(cp: f64) -> String {
    format!("{:+.1}", cp / 100.0)
}

fn tally_line(label: &str, tally: &Tally) -> String {
    format!(
        "  {label:<8} {:>4} games  {:>5.1}% won  {:>5.1}% lost  {:>5.1}% drawn",
        tally.total(),
        tally.win_rate(),
        tally.loss_rate(),
        tally.draw_rate()
    )
}

// ── Sections ──

pub fn results(summary: &ResultSummary) -> String {
    let mut out = format!("\n--- Results ({} games) ---\n", summary.overall.total());
    for (label, tally) in [
        ("overall", &summary.overall),
        ("white", &summary.white),
        ("black", &summary.black),
    ] {
        out.push_str(&tally_line(label, tally));
        out.push('\n');
    }
    out
}

pub fn openings(stats: &[OpeningStats]) -> String {
    let mut out = String::from("\n--- Openings ---\n");
    if stats.is_empty() {
        out.push_str("  No openings left book (games may be too short).\n");
        return out;
    }

    let repeated = format_summary(stats, 2);
    if repeated.is_empty() {
        out.push_str("  No opening played more than once.\n");
    } else {
        out.push_str("  Played 2+ times, best to worst:\n");
        for line in repeated {
            let _ = writeln!(out, "    {line}");
        }
    }

    let mut once: Vec<&OpeningStats> = stats.iter().filter(|s| s.times_played == 1).collect();
    if !once.is_empty() {
        once.sort_by(|a, b| b.avg_eval().total_cmp(&a.avg_eval()));
        let _ = writeln!(out, "  Played once ({} openings):", once.len());
        for s in once {
            let eco = s.eco.as_deref().map(|e| format!(" ({e})")).unwrap_or_default();
            let eval = if s.evaluated() == 0 {
                "stayed in book".to_string()
            } else {
                format!("{} pawns", pawns(s.avg_eval()))
            };
            let _ = writeln!(out, "    {}{eco} as {}: {eval}", s.name, s.color);
        }
    }
    out
}

pub fn mistakes(groups: &[DeviationGroup], top: usize) -> String {
    let mut out = format!("\n--- Recurring mistakes ({} found) ---\n", groups.len());
    if groups.is_empty() {
        out.push_str("  None. Every deviation held its evaluation.\n");
        return out;
    }
    for (rank, g) in groups.iter().take(top).enumerate() {
        let name = g.opening.as_deref().unwrap_or("Unknown Opening");
        let eco = g.eco.as_deref().map(|e| format!(" ({e})")).unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>3}. {name}{eco}, ply {}, {} to move",
            rank + 1,
            g.ply + 1,
            g.color
        );
        let _ = writeln!(out, "     {}", g.position.as_str());
        let book = if g.book_moves.is_empty() {
            "-".to_string()
        } else {
            g.book_moves.join(" ")
        };
        let _ = writeln!(
            out,
            "     played {} (x{}), best {}, book {book}",
            g.played_move,
            g.occurrences,
            g.best_move.as_deref().unwrap_or("?")
        );
        let _ = writeln!(
            out,
            "     {} -> {}, loss {} cp (min {}, max {}), {} .. {}",
            score(&g.eval.before),
            score(&g.eval.after),
            g.eval_loss(),
            g.loss_stats.min,
            g.loss_stats.max,
            g.first_seen.format("%Y-%m-%d"),
            g.last_seen.format("%Y-%m-%d")
        );
    }
    if groups.len() > top {
        let _ = writeln!(out, "  ... {} more", groups.len() - top);
    }
    out
}

pub fn run_summary(summary: &RunSummary) -> String {
    let mut out = String::from("\n--- Run summary ---\n");
    let _ = writeln!(
        out,
        "  games {}: {} in book, {} deviated, {} too short, {} malformed",
        summary.games_total, summary.in_book, summary.deviations, summary.too_short, summary.malformed
    );
    let _ = writeln!(
        out,
        "  evaluated {}, failed {}, engine requests {}",
        summary.evaluated, summary.eval_failed, summary.engine_requests
    );
    let _ = writeln!(
        out,
        "  cache: {} hits, {} misses, {} errors{}",
        summary.cache_hits,
        summary.cache_misses,
        summary.cache_errors,
        if summary.cache_writes_disabled {
            " (writes disabled)"
        } else {
            ""
        }
    );
    for failure in &summary.failures {
        let _ = writeln!(
            out,
            "  ! {} ({:?}): {}",
            failure.game_id, failure.kind, failure.reason
        );
    }
    out
}
