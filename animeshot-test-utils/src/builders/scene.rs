//! Builder for recognition matches

use animeshot_core::{Identification, SceneMatch};

/// Builder for [`SceneMatch`] values with sensible defaults
///
/// # Examples
///
/// ```rust
/// use animeshot_test_utils::SceneMatchBuilder;
///
/// let scene = SceneMatchBuilder::new()
///     .with_title("Frieren")
///     .with_episode("05")
///     .build();
/// assert_eq!(scene.resolved_title(), "Frieren");
/// ```
#[derive(Debug, Clone)]
pub struct SceneMatchBuilder {
    scene: SceneMatch,
}

impl Default for SceneMatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneMatchBuilder {
    pub fn new() -> Self {
        Self {
            scene: SceneMatch {
                anilist_id: 1,
                source_filename: "[Group] Mock Anime - 01 [1080p].mkv".to_string(),
                episode: "01".to_string(),
                timestamp: "00:00:10".to_string(),
                from_seconds: 10.0,
                similarity: 0.95,
                localized_title: Some("Mock Anime".to_string()),
            },
        }
    }

    /// Set the localized title
    pub fn with_title(mut self, title: &str) -> Self {
        self.scene.localized_title = Some(title.to_string());
        self
    }

    /// Drop the localized title so the source filename is used
    pub fn without_title(mut self) -> Self {
        self.scene.localized_title = None;
        self
    }

    pub fn with_source_filename(mut self, filename: &str) -> Self {
        self.scene.source_filename = filename.to_string();
        self
    }

    pub fn with_episode(mut self, episode: &str) -> Self {
        self.scene.episode = episode.to_string();
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.scene.timestamp = timestamp.to_string();
        self
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.scene.similarity = similarity;
        self
    }

    pub fn with_anilist_id(mut self, id: u64) -> Self {
        self.scene.anilist_id = id;
        self
    }

    pub fn build(self) -> SceneMatch {
        self.scene
    }

    /// Build wrapped in a successful identification
    pub fn identification(self) -> Identification {
        Identification::Match(self.scene)
    }
}
