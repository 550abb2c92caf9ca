//! File naming rules
//!
//! Renamed screenshots follow `<title>_Episode<episode>_<HH:MM:SS>.<ext>`. This
//! module builds those names from a match and recognises them again so files
//! renamed by an earlier run are never processed twice.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Characters that are not allowed in generated file names
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Titles longer than this are shortened
const MAX_TITLE_CHARS: usize = 100;

/// Fallback when no title can be determined
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Extension used when the source name has none
pub const DEFAULT_EXTENSION: &str = "jpg";

static PROCESSED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.+)_Episode(?P<episode>.+?)_(?P<timestamp>\d{2}:\d{2}:\d{2})\.(?P<ext>[a-z0-9]+)$",
    )
    .expect("processed name pattern is valid")
});

static RELEASE_TAGS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\[New-raws\]",
        r"(?i)\[raw\]",
        r"(?i)\[\d+x\d+\]",
        r"(?i)\[1080p\]",
        r"(?i)\[720p\]",
        r"(?i)\[NF\]",
        r"(?i)\[CR\]",
        r"(?i)\[BD\]",
        r"(?i)\[DVD\]",
        r"(?i)\[WEB\]",
        r"(?i)\[\d+~\d+\]",
        r"(?i)\s*-\s*\d+~\d+\s*",
        r"(?i)\.(mkv|mp4|avi|webm|m4v)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("release tag pattern is valid"))
    .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));
static DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").expect("valid pattern"));

/// Components parsed back out of an already renamed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedName {
    pub title: String,
    pub episode: String,
    pub timestamp: String,
}

/// Make a title safe for use in a file name
pub fn clean_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if replaced.chars().count() > MAX_TITLE_CHARS {
        let mut shortened: String = replaced.chars().take(MAX_TITLE_CHARS - 3).collect();
        shortened.push_str("...");
        shortened.trim().to_string()
    } else {
        replaced.trim().to_string()
    }
}

/// Make an episode label safe for use in a file name, `00` when nothing is left
pub fn clean_episode(episode: &str) -> String {
    let replaced: String = episode
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        "00".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derive a title from the source video filename reported by the search API
///
/// Release group, resolution and episode-range tags are stripped. Returns `None`
/// when nothing useful is left.
pub fn clean_source_filename(filename: &str) -> Option<String> {
    let mut cleaned = filename.to_string();
    for pattern in RELEASE_TAGS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned = WHITESPACE.replace_all(&cleaned, " ").into_owned();
    cleaned = DASH.replace_all(&cleaned, " ").into_owned();

    let trimmed = cleaned.trim_matches(|c| c == ' ' || c == '-');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Format the episode field of a search result
///
/// Integers are zero padded to two digits, lists use their first element, and a
/// missing episode becomes `00`.
pub fn format_episode(episode: Option<&Value>) -> String {
    match episode {
        None | Some(Value::Null) => "00".to_string(),
        Some(Value::Array(items)) => format_episode(items.first()),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(value) => format!("{value:02}"),
            None => n.to_string(),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<u64>() {
                Ok(value) => format!("{value:02}"),
                Err(_) if s.is_empty() => "00".to_string(),
                Err(_) => s.to_string(),
            }
        }
        Some(other) => other.to_string(),
    }
}

/// Format a position in seconds as `HH:MM:SS`
pub fn format_timestamp(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s as u64,
        _ => 0,
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Lowercased extension of a file name, if it has one
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Build the new file name for a recognised screenshot
///
/// Every name built here is accepted by [`parse_processed_name`].
pub fn compose_filename(
    title: &str,
    episode: &str,
    timestamp: &str,
    extension: Option<&str>,
) -> String {
    let title = clean_title(title);
    let title = if title.is_empty() {
        UNKNOWN_TITLE.to_string()
    } else {
        title
    };
    let episode = clean_episode(episode);
    let extension = extension
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION);
    format!("{title}_Episode{episode}_{timestamp}.{extension}")
}

/// Parse a file name produced by [`compose_filename`]
pub fn parse_processed_name(name: &str) -> Option<ProcessedName> {
    let captures = PROCESSED_NAME.captures(name)?;
    Some(ProcessedName {
        title: captures["title"].to_string(),
        episode: captures["episode"].to_string(),
        timestamp: captures["timestamp"].to_string(),
    })
}

/// Check if a file name already follows the rename format
pub fn is_processed_name(name: &str) -> bool {
    PROCESSED_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_clean_title_replaces_illegal_chars() {
        assert_eq!(clean_title("Re:Zero"), "Re_Zero");
        assert_eq!(clean_title("Fate/stay night"), "Fate_stay night");
        assert_eq!(clean_title("  spaced  "), "spaced");
    }

    #[test]
    fn test_clean_title_truncates_long_titles() {
        let long = "a".repeat(150);
        let cleaned = clean_title(&long);
        assert_eq!(cleaned.chars().count(), 100);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_clean_title_counts_characters_not_bytes() {
        let title = "進".repeat(100);
        assert_eq!(clean_title(&title), title);
    }

    #[test]
    fn test_clean_source_filename() {
        assert_eq!(
            clean_source_filename("[New-raws] Spy x Family - 01 [1080p] [NF].mkv").as_deref(),
            Some("Spy x Family 01")
        );
        assert_eq!(
            clean_source_filename("Frieren - 01~28 [BD]").as_deref(),
            Some("Frieren")
        );
        assert_eq!(clean_source_filename("[raw] [720p]"), None);
    }

    #[test]
    fn test_format_episode() {
        assert_eq!(format_episode(Some(&json!(3))), "03");
        assert_eq!(format_episode(Some(&json!(112))), "112");
        assert_eq!(format_episode(Some(&json!([7, 8]))), "07");
        assert_eq!(format_episode(Some(&json!([]))), "00");
        assert_eq!(format_episode(Some(&Value::Null)), "00");
        assert_eq!(format_episode(None), "00");
        assert_eq!(format_episode(Some(&json!("OVA"))), "OVA");
        assert_eq!(format_episode(Some(&json!("5"))), "05");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Some(0.0)), "00:00:00");
        assert_eq!(format_timestamp(Some(754.93)), "00:12:34");
        assert_eq!(format_timestamp(Some(3725.0)), "01:02:05");
        assert_eq!(format_timestamp(None), "00:00:00");
        assert_eq!(format_timestamp(Some(-5.0)), "00:00:00");
    }

    #[test]
    fn test_compose_filename_exact_format() {
        assert_eq!(
            compose_filename("葬送のフリーレン", "05", "00:21:03", Some("png")),
            "葬送のフリーレン_Episode05_00:21:03.png"
        );
        assert_eq!(
            compose_filename("Re:Zero", "01", "00:00:10", None),
            "Re_Zero_Episode01_00:00:10.jpg"
        );
        assert_eq!(
            compose_filename("  ", "01", "00:00:10", None),
            "Unknown_Episode01_00:00:10.jpg"
        );
    }

    #[test]
    fn test_parse_processed_name() {
        let parsed = parse_processed_name("Bocchi the Rock!_Episode08_00:05:12.jpg").unwrap();
        assert_eq!(parsed.title, "Bocchi the Rock!");
        assert_eq!(parsed.episode, "08");
        assert_eq!(parsed.timestamp, "00:05:12");

        assert!(is_processed_name("Anime_123_Episode01_00:00:01.JPG"));
        assert!(!is_processed_name("Screenshot 2024-05-01.png"));
        assert!(!is_processed_name("Title_Episode01_0:00:01.png"));
        assert!(!is_processed_name("Title_Episode_00:00:01.png"));
    }

    #[test]
    fn test_non_numeric_episodes_and_other_extensions_round_trip() {
        let name = compose_filename("Mob Psycho 100", "OVA", "00:03:00", Some("heic"));
        assert_eq!(name, "Mob Psycho 100_EpisodeOVA_00:03:00.heic");
        let parsed = parse_processed_name(&name).unwrap();
        assert_eq!(parsed.title, "Mob Psycho 100");
        assert_eq!(parsed.episode, "OVA");

        let name = compose_filename("Haikyuu", "1/2", "00:00:09", Some("tiff"));
        assert_eq!(name, "Haikyuu_Episode1_2_00:00:09.tiff");
        assert_eq!(parse_processed_name(&name).unwrap().episode, "1_2");

        assert_eq!(
            compose_filename("Haikyuu", " ", "00:00:09", Some("jp g")),
            "Haikyuu_Episode00_00:00:09.jpg"
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("noext"), None);
    }

    proptest! {
        #[test]
        fn prop_clean_title_never_contains_illegal_chars(title in "\\PC{0,200}") {
            let cleaned = clean_title(&title);
            prop_assert!(!cleaned.chars().any(|c| ILLEGAL_CHARS.contains(&c)));
            prop_assert!(cleaned.chars().count() <= MAX_TITLE_CHARS);
        }

        #[test]
        fn prop_composed_names_are_recognised(
            title in "[A-Za-z][A-Za-z0-9 ]{0,40}",
            episode in 0u32..2000,
            seconds in 0u32..86_000,
        ) {
            let episode = format!("{episode:02}");
            let timestamp = format_timestamp(Some(f64::from(seconds)));
            let name = compose_filename(&title, &episode, &timestamp, Some("jpg"));
            let parsed = parse_processed_name(&name).unwrap();
            prop_assert_eq!(parsed.episode, episode);
            prop_assert_eq!(parsed.timestamp, timestamp);
        }

        #[test]
        fn prop_any_episode_label_and_extension_is_recognised(
            title in "[A-Za-z][A-Za-z0-9 ]{0,40}",
            episode in "[A-Za-z0-9 .:/-]{0,10}",
            extension in "[a-z0-9]{1,5}",
            seconds in 0u32..86_000,
        ) {
            let timestamp = format_timestamp(Some(f64::from(seconds)));
            let name = compose_filename(&title, &episode, &timestamp, Some(&extension));
            let parsed = parse_processed_name(&name).unwrap();
            prop_assert_eq!(parsed.episode, clean_episode(&episode));
            prop_assert_eq!(parsed.timestamp, timestamp);
        }
    }
}
