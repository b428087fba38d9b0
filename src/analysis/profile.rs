//! Parsing and strict validation of the model's analysis answer.

use crate::collection_store::Emotion;
use serde::Deserialize;
use serde_json::Value;

/// A validated analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisProfile {
    pub emotion: Emotion,
    /// Stored as returned, even outside [0, 1].
    pub valence: f64,
    pub energy: f64,
    pub tempo: Option<i64>,
    pub genre: String,
    pub mood_description: String,
    pub dominant_instruments: Option<String>,
    pub vocal_characteristics: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Instruments {
    Text(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct RawProfile {
    emotion: String,
    valence: f64,
    energy: f64,
    #[serde(default)]
    tempo: Option<f64>,
    genre: String,
    mood_description: String,
    #[serde(default)]
    dominant_instruments: Option<Instruments>,
    vocal_characteristics: String,
}

/// Finds the first balanced `{...}` block of `text` that parses as a JSON object.
///
/// Models tend to wrap their JSON in prose or markdown fences; braces inside
/// string literals are not counted.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(&bytes[start..]) {
            let candidate = &text[start..=start + end];
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Index of the brace closing the one at `bytes[0]`.
fn matching_brace(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Checks the extracted object against the expected shape.
///
/// Missing required fields, wrong types and labels outside the emotion set
/// are all rejected; nothing is filled in with defaults.
pub fn validate_profile(value: Value) -> Result<AnalysisProfile, String> {
    let raw: RawProfile =
        serde_json::from_value(value).map_err(|e| format!("unexpected shape: {}", e))?;

    let label = raw.emotion.trim().to_ascii_lowercase();
    let emotion = Emotion::from_str(&label)
        .ok_or_else(|| format!("'{}' is not an allowed emotion", raw.emotion))?;

    let tempo = raw.tempo.and_then(tempo_bpm);

    let dominant_instruments = match raw.dominant_instruments {
        Some(Instruments::Text(text)) => Some(text),
        Some(Instruments::List(list)) => Some(list.join(", ")),
        None => None,
    }
    .filter(|s| !s.trim().is_empty());

    Ok(AnalysisProfile {
        emotion,
        valence: raw.valence,
        energy: raw.energy,
        tempo,
        genre: raw.genre,
        mood_description: raw.mood_description,
        dominant_instruments,
        vocal_characteristics: raw.vocal_characteristics,
    })
}

/// Whole BPM for an optional tempo.
///
/// Fractional values round to the nearest integer. Zero, negative and
/// non-finite values carry no usable tempo and become `None`.
fn tempo_bpm(bpm: f64) -> Option<i64> {
    if !bpm.is_finite() {
        return None;
    }
    let rounded = bpm.round();
    (rounded >= 1.0).then_some(rounded as i64)
}

/// Extraction followed by validation.
pub fn parse_analysis_response(text: &str) -> Result<AnalysisProfile, String> {
    let value = extract_json_object(text).ok_or_else(|| "no JSON object found".to_string())?;
    validate_profile(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VALID: &str = r#"{"emotion": "nostalgia", "valence": 0.35, "energy": 0.4,
        "tempo": 92, "genre": "folk", "mood_description": "wistful",
        "dominant_instruments": "acoustic guitar", "vocal_characteristics": "soft"}"#;

    #[test]
    fn extracts_from_markdown_fence() {
        let text = format!("Here is the analysis:\n```json\n{}\n```\nHope it helps!", VALID);
        let profile = parse_analysis_response(&text).unwrap();
        assert_eq!(profile.emotion, Emotion::Nostalgia);
        assert_eq!(profile.tempo, Some(92));
        assert_eq!(profile.dominant_instruments.as_deref(), Some("acoustic guitar"));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_extraction() {
        let text = r#"note {not json} then {"a": "}{", "b": {"c": 1}} trailing }"#;
        assert_eq!(
            extract_json_object(text),
            Some(json!({"a": "}{", "b": {"c": 1}}))
        );
    }

    #[test]
    fn no_object_is_none() {
        assert_eq!(extract_json_object("I cannot help with that."), None);
        assert_eq!(extract_json_object("{ unbalanced"), None);
        assert!(parse_analysis_response("[1, 2, 3]").is_err());
    }

    #[test]
    fn unknown_emotion_is_rejected() {
        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value["emotion"] = json!("happiness");
        let err = validate_profile(value).unwrap_err();
        assert!(err.contains("happiness"));
    }

    #[test]
    fn emotion_label_case_is_normalized() {
        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value["emotion"] = json!(" Calm ");
        assert_eq!(validate_profile(value).unwrap().emotion, Emotion::Calm);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value.as_object_mut().unwrap().remove("valence");
        assert!(validate_profile(value).is_err());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value["energy"] = json!("high");
        assert!(validate_profile(value).is_err());
    }

    #[test]
    fn optional_fields_may_be_absent_or_lists() {
        let value = json!({
            "emotion": "joy", "valence": 1.2, "energy": -0.1,
            "genre": "pop", "mood_description": "bouncy",
            "dominant_instruments": ["synth", "drums"],
            "vocal_characteristics": "bright"
        });
        let profile = validate_profile(value).unwrap();
        assert_eq!(profile.tempo, None);
        assert_eq!(profile.valence, 1.2);
        assert_eq!(profile.energy, -0.1);
        assert_eq!(profile.dominant_instruments.as_deref(), Some("synth, drums"));
    }

    #[test]
    fn non_positive_tempo_is_dropped_without_failing() {
        for bpm in [json!(0), json!(-5), json!(0.2)] {
            let mut value: Value = serde_json::from_str(VALID).unwrap();
            value["tempo"] = bpm;
            let profile = validate_profile(value).unwrap();
            assert_eq!(profile.tempo, None);
            assert_eq!(profile.emotion, Emotion::Nostalgia);
        }
    }

    #[test]
    fn fractional_tempo_rounds_to_nearest_bpm() {
        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value["tempo"] = json!(119.6);
        assert_eq!(validate_profile(value).unwrap().tempo, Some(120));

        let mut value: Value = serde_json::from_str(VALID).unwrap();
        value["tempo"] = json!(92.4);
        assert_eq!(validate_profile(value).unwrap().tempo, Some(92));
    }
}
