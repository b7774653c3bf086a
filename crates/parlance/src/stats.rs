// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance stats` command implementation.

use parlance_config::ParlanceConfig;
use parlance_core::{ParlanceError, UserId};
use parlance_phonemes::{PhonemeAggregator, PhonemeReport};

pub async fn run_stats(
    config: &ParlanceConfig,
    user: &str,
    limit: usize,
    json: bool,
) -> Result<(), ParlanceError> {
    let storage = crate::open_storage(config).await?;
    let report = PhonemeAggregator::new(storage)
        .user_report(&UserId(user.to_string()))
        .await?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| ParlanceError::Internal(format!("failed to render report: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", render_report(&report, limit));
    }
    Ok(())
}

fn render_report(report: &PhonemeReport, limit: usize) -> String {
    if report.total_attempts == 0 {
        return format!("no pronunciation data for {}\n", report.user_id);
    }

    let mut out = format!(
        "{}: {}/{} phonemes correct ({:.1}%)\n",
        report.user_id, report.total_correct, report.total_attempts, report.overall_accuracy
    );
    out.push_str("\nweakest phonemes\n");
    for p in report.weakest(limit) {
        out.push_str(&format!(
            "  /{}/  {:>5.1}%  {}/{}\n",
            p.phoneme,
            p.accuracy(),
            p.correct_count,
            p.total_attempts
        ));
    }
    if !report.top_substitutions.is_empty() {
        out.push_str("\ncommon substitutions\n");
        for s in &report.top_substitutions {
            out.push_str(&format!(
                "  /{}/ -> /{}/  x{}\n",
                s.expected_phoneme, s.actual_phoneme, s.occurrence_count
            ));
        }
    }
    out
}
