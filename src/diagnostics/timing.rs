use serde::{Deserialize, Serialize};

/// Wall-clock time of one named stage (pyramid, a level's propagation, a
/// prior build, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated timing trace of one controller run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn with_total(total_ms: f64) -> Self {
        Self {
            total_ms,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }

    /// Sum of the recorded stages.
    pub fn stages_ms(&self) -> f64 {
        self.stages.iter().map(|s| s.elapsed_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_serialize_in_camel_case() {
        let mut timing = TimingBreakdown::with_total(12.5);
        timing.push("level0", 10.0);
        timing.push("prior0", 2.0);
        assert_eq!(timing.stages_ms(), 12.0);
        let json = serde_json::to_string(&timing).expect("serialize");
        assert!(json.contains("\"totalMs\":12.5"));
        assert!(json.contains("\"elapsedMs\":10.0"));
    }
}
