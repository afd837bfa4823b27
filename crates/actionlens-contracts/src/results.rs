use serde::Serialize;

use crate::catalog::ActionCatalog;
use crate::predictions::{PredictionItem, PredictionList};

/// Number of rows shown in the secondary ranked list.
pub const RANKED_ROWS: usize = 5;

const HIGH_CONFIDENCE: f64 = 60.0;
const MEDIUM_CONFIDENCE: f64 = 40.0;

/// Qualitative styling band for a confidence value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            Self::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    pub rank: u32,
    pub action: String,
    pub label: String,
    pub glyph: String,
    pub confidence: f64,
    pub band: ConfidenceBand,
}

impl ResultRow {
    fn from_item(item: &PredictionItem, catalog: &ActionCatalog) -> Self {
        let confidence = display_confidence(item.confidence);
        Self {
            rank: item.rank,
            action: item.action.clone(),
            label: catalog.label_for(&item.action),
            glyph: catalog.glyph_for(&item.action).to_string(),
            confidence,
            band: ConfidenceBand::from_confidence(confidence),
        }
    }

    /// Confidence with one decimal, e.g. `72.3%`.
    pub fn confidence_text(&self) -> String {
        format!("{:.1}%", self.confidence)
    }
}

/// What the results panel shows for one prediction list.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultsView {
    pub headline: Option<ResultRow>,
    pub ranked: Vec<ResultRow>,
}

impl ResultsView {
    pub fn is_empty(&self) -> bool {
        self.headline.is_none()
    }
}

pub fn render_results(predictions: &PredictionList, catalog: &ActionCatalog) -> ResultsView {
    let ranked = predictions
        .by_rank()
        .into_iter()
        .take(RANKED_ROWS)
        .map(|item| ResultRow::from_item(item, catalog))
        .collect::<Vec<ResultRow>>();
    ResultsView {
        headline: predictions
            .top()
            .map(|item| ResultRow::from_item(item, catalog)),
        ranked,
    }
}

fn display_confidence(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
