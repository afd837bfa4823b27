use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ranked result as returned by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionItem {
    pub rank: u32,
    pub action: String,
    pub confidence: f64,
}

/// Ranked results in the order the service returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionList(Vec<PredictionItem>);

impl PredictionList {
    pub fn new(items: Vec<PredictionItem>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[PredictionItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The item with the lowest rank; ties keep service order. This is the
    /// headline everywhere a single action is reported.
    pub fn top(&self) -> Option<&PredictionItem> {
        self.0.iter().min_by_key(|item| item.rank)
    }

    /// Items ordered by rank. Ties keep service order.
    pub fn by_rank(&self) -> Vec<&PredictionItem> {
        let mut items = self.0.iter().collect::<Vec<&PredictionItem>>();
        items.sort_by_key(|item| item.rank);
        items
    }

    /// Describes every way the list departs from the ranking contract:
    /// ranks unique and contiguous from 1, confidence in [0, 100] and
    /// non-increasing by rank.
    pub fn contract_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let ranked = self.by_rank();
        for (idx, item) in ranked.iter().enumerate() {
            let expected = idx as u32 + 1;
            if item.rank != expected {
                violations.push(format!(
                    "rank {} found where rank {expected} was expected",
                    item.rank
                ));
            }
            if !item.confidence.is_finite() || !(0.0..=100.0).contains(&item.confidence) {
                violations.push(format!(
                    "confidence {} for '{}' is outside [0, 100]",
                    item.confidence, item.action
                ));
            }
            if let Some(prev) = idx.checked_sub(1).and_then(|prev| ranked.get(prev)) {
                if item.confidence > prev.confidence {
                    violations.push(format!(
                        "rank {} has higher confidence than rank {}",
                        item.rank, prev.rank
                    ));
                }
            }
        }
        violations
    }
}

impl From<Vec<PredictionItem>> for PredictionList {
    fn from(items: Vec<PredictionItem>) -> Self {
        Self(items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPrediction {
    pub action: String,
    pub confidence: f64,
}

/// Success body of `POST /predict` after it has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predictions: PredictionList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_prediction: Option<TopPrediction>,
}

/// Error body the service may attach to a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Human-readable cause. Plain string details are returned verbatim;
    /// validation-style lists are joined from their `msg` entries.
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(text) => Some(text.clone()).filter(|text| !text.trim().is_empty()),
            Value::Array(rows) => {
                let messages = rows
                    .iter()
                    .filter_map(|row| row.get("msg").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|msg| !msg.is_empty())
                    .collect::<Vec<&str>>();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default)]
    pub num_classes: u32,
}

/// Body of `GET /actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsResponse {
    pub actions: Vec<String>,
    #[serde(default)]
    pub count: usize,
}
