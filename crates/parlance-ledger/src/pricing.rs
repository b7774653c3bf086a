// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit prices per conversational turn.

use parlance_config::model::CreditsConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a user submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    /// Typed message: reply generation only.
    Text,
    /// Spoken message: reply generation plus pronunciation analysis.
    Audio,
}

/// Credit cost of each kind of turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostSchedule {
    pub text_turn_cost: i64,
    pub audio_turn_cost: i64,
}

impl CostSchedule {
    pub fn from_config(config: &CreditsConfig) -> Self {
        Self {
            text_turn_cost: config.text_turn_cost,
            audio_turn_cost: config.audio_turn_cost,
        }
    }

    pub fn cost_of(&self, turn: TurnKind) -> i64 {
        match turn {
            TurnKind::Text => self.text_turn_cost,
            TurnKind::Audio => self.audio_turn_cost,
        }
    }

    /// Ledger reason recorded with the debit.
    pub fn reason_for(turn: TurnKind) -> String {
        format!("{turn} turn")
    }
}

impl Default for CostSchedule {
    fn default() -> Self {
        Self::from_config(&CreditsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_come_from_config() {
        let schedule = CostSchedule::from_config(&CreditsConfig {
            text_turn_cost: 2,
            audio_turn_cost: 7,
            default_allowance: 0,
        });
        assert_eq!(schedule.cost_of(TurnKind::Text), 2);
        assert_eq!(schedule.cost_of(TurnKind::Audio), 7);
    }

    #[test]
    fn default_audio_costs_more_than_text() {
        let schedule = CostSchedule::default();
        assert!(schedule.cost_of(TurnKind::Audio) > schedule.cost_of(TurnKind::Text));
        assert_eq!(CostSchedule::reason_for(TurnKind::Audio), "audio turn");
    }
}
