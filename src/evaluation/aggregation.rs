use std::sync::Arc;

use log::debug;

use super::{store::EvaluationStore, CalculationOutcome};
use crate::error::Result;
use crate::model::{common::GroupCode, common::QuestionStatus, mongodb::Id};

/// Computes a group's outcome from its closed responses and writes it onto the question.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn EvaluationStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn EvaluationStore>) -> Self {
        Self { store }
    }

    /// Recompute the outcome of a group from its current state.
    ///
    /// If enough responses have been closed, the mean score decides between
    /// `Approved` and `Denied` and both are written in a single update.
    /// Otherwise nothing is written. Safe to repeat.
    pub async fn recalculate(&self, question_id: Id, code: &GroupCode) -> Result<CalculationOutcome> {
        let settings = self.store.settings().await?;
        let members = self.store.group_members(question_id, code).await?;
        let points: Vec<u8> = members
            .iter()
            .filter_map(|request| request.scored_point())
            .collect();

        let required = settings.min_elector_count;
        let responses = points.len();
        if points.is_empty() || responses < required as usize {
            debug!("Group {code} has {responses}/{required} responses, not evaluating yet");
            return Ok(CalculationOutcome::Insufficient {
                responses,
                required,
            });
        }

        let score = mean(&points);
        let status = if score >= settings.min_pass_point {
            QuestionStatus::Approved
        } else {
            QuestionStatus::Denied
        };
        self.store.apply_outcome(question_id, status, score).await?;
        debug!("Group {code} evaluated question {question_id}: {status:?} ({score})");

        Ok(CalculationOutcome::Computed {
            status,
            score,
            responses,
        })
    }
}

fn mean(points: &[u8]) -> f64 {
    let sum: u32 = points.iter().map(|&p| u32::from(p)).sum();
    f64::from(sum) / points.len() as f64
}
