//! Verdict types shared between the inference pipelines and the API.

use serde::{Deserialize, Serialize};

/// Classification label for a piece of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    /// Upper-case form used in client payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "REAL",
            Label::Fake => "FAKE",
        }
    }

    /// Lower-case form used in templated explanation text.
    pub fn as_lower(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Video,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Video => "video",
        }
    }

    /// Human-readable name of the network family behind each modality.
    pub fn network_name(&self) -> &'static str {
        match self {
            Modality::Image => "Vision Transformer",
            Modality::Video => "Generative Convolutional Vision Transformer",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated decision for one request.
///
/// Created once per request, consumed by the explanation generator and the
/// response assembler, never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub modality: Modality,
}

impl Verdict {
    pub fn new(label: Label, confidence: f64, modality: Modality) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            modality,
        }
    }

    /// Percentage string with two fractional digits, e.g. `"87.43%"`.
    pub fn confidence_str(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// Prediction payload as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_class: String,
    pub confidence_str: String,
    #[serde(rename = "type")]
    pub modality: Modality,
}

impl From<&Verdict> for Prediction {
    fn from(verdict: &Verdict) -> Self {
        Self {
            predicted_class: verdict.label.as_str().to_string(),
            confidence_str: verdict.confidence_str(),
            modality: verdict.modality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_str_two_fractional_digits() {
        let verdict = Verdict::new(Label::Fake, 0.8743, Modality::Image);
        assert_eq!(verdict.confidence_str(), "87.43%");

        let verdict = Verdict::new(Label::Real, 1.0, Modality::Video);
        assert_eq!(verdict.confidence_str(), "100.00%");

        let verdict = Verdict::new(Label::Real, 0.0, Modality::Image);
        assert_eq!(verdict.confidence_str(), "0.00%");
    }

    #[test]
    fn test_confidence_clamped() {
        let verdict = Verdict::new(Label::Fake, 1.3, Modality::Video);
        assert_eq!(verdict.confidence, 1.0);

        let verdict = Verdict::new(Label::Real, -0.1, Modality::Image);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_prediction_payload_shape() {
        let verdict = Verdict::new(Label::Fake, 0.8833333, Modality::Video);
        let prediction = Prediction::from(&verdict);

        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["predicted_class"], "FAKE");
        assert_eq!(json["confidence_str"], "88.33%");
        assert_eq!(json["type"], "video");
    }

    #[test]
    fn test_label_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Label::Real).unwrap(), "\"REAL\"");
        assert_eq!(
            serde_json::from_str::<Label>("\"FAKE\"").unwrap(),
            Label::Fake
        );
    }

    #[test]
    fn test_network_names() {
        assert_eq!(Modality::Image.network_name(), "Vision Transformer");
        assert_eq!(
            Modality::Video.network_name(),
            "Generative Convolutional Vision Transformer"
        );
    }
}
