use super::table::Row;

// ---------------------------------------------------------------------------
// What-if simulation state
// ---------------------------------------------------------------------------

/// Direction of the simulated prediction relative to the original row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDirection {
    Increased,
    Decreased,
}

impl RiskDirection {
    pub fn label(self) -> &'static str {
        match self {
            RiskDirection::Increased => "Risk increased",
            RiskDirection::Decreased => "Risk decreased",
        }
    }
}

/// The selected row, its editable feature copy, and the latest simulated
/// prediction. Replaced wholesale when another row is selected.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    /// The row the features were seeded from. `None` means idle.
    pub selected: Option<Row>,
    /// Editable feature values, in row order, prediction column excluded.
    pub features: Vec<(String, String)>,
    /// Latest simulated prediction, cleared on every reselection.
    pub result: Option<f64>,
    /// Error from the most recent simulate call, if any.
    pub error: Option<String>,
    /// Bumped on every reselection; a simulate response carrying an older
    /// epoch belongs to a discarded selection and is dropped.
    pub epoch: u64,
}

impl SimulationState {
    /// Seed from a freshly selected row, discarding any previous edits and
    /// result unconditionally. The prediction column never becomes a feature,
    /// regardless of its casing.
    pub fn select(&mut self, row: &Row) {
        let features = row
            .fields
            .iter()
            .filter(|(name, _)| !Row::is_prediction_column(name))
            .cloned()
            .collect();
        *self = SimulationState {
            selected: Some(row.clone()),
            features,
            result: None,
            error: None,
            epoch: self.epoch + 1,
        };
    }

    pub fn is_seeded(&self) -> bool {
        self.selected.is_some()
    }

    /// Edit a single feature in place. Does not reset `result`; the stale
    /// value stands until the next simulate call replaces it.
    pub fn set_feature(&mut self, name: &str, value: String) {
        if let Some(slot) = self.features.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        }
    }

    /// Record a successful simulate response.
    pub fn apply_result(&mut self, prediction: f64) {
        self.result = Some(prediction);
        self.error = None;
    }

    /// Record a failed simulate call; the previous result stays.
    pub fn apply_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Original prediction of the selected row, coerced to a number.
    pub fn original_prediction(&self) -> Option<f64> {
        self.selected.as_ref().and_then(Row::prediction_value)
    }

    /// Directional comparison of the simulated result against the original
    /// prediction. Equality counts as decreased. `None` until both values
    /// are available as numbers.
    pub fn risk_delta(&self) -> Option<RiskDirection> {
        let new = self.result?;
        let original = self.original_prediction()?;
        if new > original {
            Some(RiskDirection::Increased)
        } else {
            Some(RiskDirection::Decreased)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> Row {
        Row {
            fields: fields
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn select_seeds_features_without_prediction_key() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "0.8")]));
        assert_eq!(sim.features, vec![("a".to_string(), "1".to_string())]);
        assert!(sim.result.is_none());
    }

    #[test]
    fn prediction_key_excluded_regardless_of_casing() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("Prediction", "0.8")]));
        assert!(sim.features.iter().all(|(n, _)| n != "Prediction"));
        assert_eq!(sim.features.len(), 1);
    }

    #[test]
    fn edits_do_not_clear_result() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "0.5")]));
        sim.apply_result(0.7);
        sim.set_feature("a", "2".to_string());
        assert_eq!(sim.result, Some(0.7));
        assert_eq!(sim.features[0].1, "2");
    }

    #[test]
    fn reselection_discards_edits_and_result() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "0.5")]));
        sim.set_feature("a", "99".to_string());
        sim.apply_result(0.9);

        sim.select(&row(&[("a", "3"), ("prediction", "0.2")]));
        assert_eq!(sim.features, vec![("a".to_string(), "3".to_string())]);
        assert!(sim.result.is_none());
        assert!(sim.error.is_none());
        assert_eq!(sim.epoch, 2);
    }

    #[test]
    fn risk_delta_is_directional_with_equality_decreased() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "0.5")]));

        sim.apply_result(0.6);
        assert_eq!(sim.risk_delta(), Some(RiskDirection::Increased));

        sim.apply_result(0.5);
        assert_eq!(sim.risk_delta(), Some(RiskDirection::Decreased));

        sim.apply_result(0.4);
        assert_eq!(sim.risk_delta(), Some(RiskDirection::Decreased));
    }

    #[test]
    fn risk_delta_absent_without_numeric_original() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "n/a")]));
        sim.apply_result(0.6);
        assert_eq!(sim.risk_delta(), None);
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut sim = SimulationState::default();
        sim.select(&row(&[("a", "1"), ("prediction", "0.5")]));
        sim.apply_result(0.7);
        sim.apply_error("backend down".to_string());
        assert_eq!(sim.result, Some(0.7));
        assert_eq!(sim.error.as_deref(), Some("backend down"));
    }
}
