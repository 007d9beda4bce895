//! Defensive parsers for oracle output.
//!
//! The text oracle is a black box and its replies are best-effort prose.
//! Every parser here is total: malformed input yields a neutral fallback,
//! tagged so callers can tell a parsed value from a substituted one.

/// Result of parsing oracle text. `Fallback` carries the neutral default
/// substituted when the reply did not match the expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> ParseOutcome<T> {
    /// Unwraps to the carried value, parsed or substituted.
    pub fn value(self) -> T {
        match self {
            ParseOutcome::Parsed(v) | ParseOutcome::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback(_))
    }
}

/// Appraisal of an observed event: importance, emotion label, intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct Appraisal {
    pub importance: u8,
    pub emotion_type: String,
    pub intensity: f32,
}

impl Appraisal {
    fn neutral() -> Self {
        Self {
            importance: 5,
            emotion_type: "normal".to_string(),
            intensity: 5.0,
        }
    }
}

/// Parses `"importance, emotion_type, intensity"`.
///
/// Importance clamps to 1..=10, intensity to 0..=10. Anything that does not
/// yield all three fields falls back to `(5, "normal", 5.0)`.
pub fn parse_appraisal(text: &str) -> ParseOutcome<Appraisal> {
    let mut parts = text.splitn(3, ',').map(str::trim);
    let importance = parts.next().and_then(first_number);
    let emotion = parts.next().filter(|s| !s.is_empty());
    let intensity = parts.next().and_then(first_number);

    match (importance, emotion, intensity) {
        (Some(imp), Some(label), Some(int)) => ParseOutcome::Parsed(Appraisal {
            importance: (imp.round() as i64).clamp(1, 10) as u8,
            emotion_type: label.to_string(),
            intensity: int.clamp(0.0, 10.0),
        }),
        _ => ParseOutcome::Fallback(Appraisal::neutral()),
    }
}

/// Parses `"label, score"` pairs used for both emotion updates and
/// agent-to-agent feelings. Falls back to `("normal", 5.0)`.
pub fn parse_label_score(text: &str) -> ParseOutcome<(String, f32)> {
    let mut parts = text.splitn(2, ',').map(str::trim);
    let label = parts.next().filter(|s| !s.is_empty());
    let score = parts.next().and_then(first_number);

    match (label, score) {
        (Some(label), Some(score)) => {
            ParseOutcome::Parsed((label.to_string(), score.clamp(0.0, 10.0)))
        }
        _ => ParseOutcome::Fallback(("normal".to_string(), 5.0)),
    }
}

/// Extracts the first numeric token, clamped to 0..=10. Fallback 5.0.
pub fn parse_intensity(text: &str) -> ParseOutcome<f32> {
    match first_number(text) {
        Some(n) => ParseOutcome::Parsed(n.clamp(0.0, 10.0)),
        None => ParseOutcome::Fallback(5.0),
    }
}

/// Affirmative check: any case-insensitive "yes" anywhere in the reply.
pub fn parse_yes(text: &str) -> bool {
    text.to_ascii_lowercase().contains("yes")
}

/// Stance toward a remembered position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Agree,
    Disagree,
}

/// "disagree" anywhere wins; everything else reads as agreement.
pub fn parse_stance(text: &str) -> Stance {
    if text.to_ascii_lowercase().contains("disagree") {
        Stance::Disagree
    } else {
        Stance::Agree
    }
}

/// Scans for the first substring that parses as an f32, tolerating
/// surrounding prose ("about 7 out of 10" yields 7.0).
fn first_number(text: &str) -> Option<f32> {
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() || (ch == '.' && !current.is_empty() && !current.contains('.')) {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    current.trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appraisal_well_formed() {
        let outcome = parse_appraisal("8, excited, 7.5");
        assert!(!outcome.is_fallback());
        let appraisal = outcome.value();
        assert_eq!(appraisal.importance, 8);
        assert_eq!(appraisal.emotion_type, "excited");
        assert_eq!(appraisal.intensity, 7.5);
    }

    #[test]
    fn test_appraisal_tolerates_prose() {
        let appraisal = parse_appraisal("Importance: 9, worried, around 6 I think").value();
        assert_eq!(appraisal.importance, 9);
        assert_eq!(appraisal.intensity, 6.0);
    }

    #[test]
    fn test_appraisal_clamps_ranges() {
        let appraisal = parse_appraisal("42, furious, 99").value();
        assert_eq!(appraisal.importance, 10);
        assert_eq!(appraisal.intensity, 10.0);

        let appraisal = parse_appraisal("0, calm, 2").value();
        assert_eq!(appraisal.importance, 1);
    }

    #[test]
    fn test_appraisal_malformed_falls_back() {
        for garbage in ["", "hello world", "7, excited", "a, b, c", ", ,"] {
            let outcome = parse_appraisal(garbage);
            assert!(outcome.is_fallback(), "expected fallback for {garbage:?}");
            let appraisal = outcome.value();
            assert_eq!(appraisal.importance, 5);
            assert_eq!(appraisal.emotion_type, "normal");
            assert_eq!(appraisal.intensity, 5.0);
        }
    }

    #[test]
    fn test_label_score() {
        assert_eq!(
            parse_label_score("admiring, 8").value(),
            ("admiring".to_string(), 8.0)
        );
        let outcome = parse_label_score("no comma here");
        assert!(outcome.is_fallback());
        assert_eq!(outcome.value(), ("normal".to_string(), 5.0));
    }

    #[test]
    fn test_intensity_first_token_and_clamp() {
        assert_eq!(parse_intensity("7").value(), 7.0);
        assert_eq!(parse_intensity("maybe 3.5 now").value(), 3.5);
        assert_eq!(parse_intensity("15").value(), 10.0);
        let outcome = parse_intensity("none");
        assert!(outcome.is_fallback());
        assert_eq!(outcome.value(), 5.0);
    }

    #[test]
    fn test_yes_no() {
        assert!(parse_yes("YES"));
        assert!(parse_yes("Yes, absolutely"));
        assert!(!parse_yes("no way"));
        assert!(!parse_yes(""));
    }

    #[test]
    fn test_stance() {
        assert_eq!(parse_stance("I disagree strongly"), Stance::Disagree);
        assert_eq!(parse_stance("agree"), Stance::Agree);
        assert_eq!(parse_stance("whatever"), Stance::Agree);
    }
}
