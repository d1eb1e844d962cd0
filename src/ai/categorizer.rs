// Keyword-based theme/category inference
//
// Used when the model ignored the categorization schema but still produced
// text (usually task-shaped objects). Tables are checked in order and the
// first substring hit wins.
use crate::model::{Theme, DEFAULT_CATEGORY};

/// Ordered (substring -> theme) rules
pub const THEME_KEYWORDS: &[(&str, Theme)] = &[
    ("meeting", Theme::Work),
    ("project", Theme::Work),
    ("client", Theme::Work),
    ("deadline", Theme::Work),
    ("report", Theme::Work),
    ("invoice", Theme::Finance),
    ("payment", Theme::Finance),
    ("bill", Theme::Finance),
    ("bank", Theme::Finance),
    ("tax", Theme::Finance),
    ("order", Theme::Shopping),
    ("purchase", Theme::Shopping),
    ("shipping", Theme::Shopping),
    ("delivery", Theme::Shopping),
    ("trip", Theme::Travel),
    ("flight", Theme::Travel),
    ("hotel", Theme::Travel),
    ("booking", Theme::Travel),
    ("doctor", Theme::Health),
    ("appointment", Theme::Health),
    ("prescription", Theme::Health),
    ("course", Theme::Education),
    ("school", Theme::Education),
    ("exam", Theme::Education),
    ("family", Theme::Personal),
    ("friend", Theme::Personal),
    ("birthday", Theme::Personal),
];

/// Ordered (substring -> category) rules
pub const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("meeting", "meeting"),
    ("project", "meeting"),
    ("client", "meeting"),
    ("deadline", "deadline"),
    ("report", "report"),
    ("invoice", "payment"),
    ("payment", "payment"),
    ("bill", "payment"),
    ("bank", "banking"),
    ("tax", "taxes"),
    ("order", "order"),
    ("purchase", "order"),
    ("shipping", "delivery"),
    ("delivery", "delivery"),
    ("trip", "trip"),
    ("flight", "flight"),
    ("hotel", "accommodation"),
    ("booking", "booking"),
    ("doctor", "appointment"),
    ("appointment", "appointment"),
    ("prescription", "medication"),
    ("course", "course"),
    ("school", "school"),
    ("exam", "exam"),
    ("family", "family"),
    ("friend", "social"),
    ("birthday", "event"),
];

pub fn infer_theme(text: &str) -> Theme {
    let lowered = text.to_lowercase();
    THEME_KEYWORDS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, theme)| *theme)
        .unwrap_or(Theme::Other)
}

pub fn infer_category(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_maps_to_work_meeting() {
        assert_eq!(infer_theme("Prepare for the Meeting"), Theme::Work);
        assert_eq!(infer_category("Prepare for the Meeting"), "meeting");
    }

    #[test]
    fn test_first_rule_wins() {
        // "meeting" precedes "payment" in both tables
        let text = "Discuss payment terms at the meeting";
        assert_eq!(infer_theme(text), Theme::Work);
        assert_eq!(infer_category(text), "meeting");
    }

    #[test]
    fn test_finance_and_travel() {
        assert_eq!(infer_theme("Pay the electricity bill"), Theme::Finance);
        assert_eq!(infer_category("Pay the electricity bill"), "payment");
        assert_eq!(infer_theme("Check in for your flight"), Theme::Travel);
        assert_eq!(infer_category("Check in for your flight"), "flight");
    }

    #[test]
    fn test_no_match_falls_through() {
        assert_eq!(infer_theme("Hello there"), Theme::Other);
        assert_eq!(infer_category("Hello there"), "general");
        assert_eq!(infer_theme(""), Theme::Other);
    }
}
