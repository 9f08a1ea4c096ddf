//! Media links attached to tracks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A playable link to a track on an external provider.
///
/// The provider set is closed; exporters match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaLink {
    /// YouTube video id
    Youtube { id: String },
    /// Spotify track id
    Spotify { id: String },
    /// SoundCloud permalink (SoundCloud ids are not stable, so the URL is kept)
    Soundcloud { url: String },
    /// Beatport track id
    Beatport { id: String },
}

impl MediaLink {
    /// Short provider tag, e.g. `"youtube"`.
    pub fn provider(&self) -> &'static str {
        match self {
            MediaLink::Youtube { .. } => "youtube",
            MediaLink::Spotify { .. } => "spotify",
            MediaLink::Soundcloud { .. } => "soundcloud",
            MediaLink::Beatport { .. } => "beatport",
        }
    }

    /// Canonical external URL for the linked media.
    pub fn url(&self) -> String {
        match self {
            MediaLink::Youtube { id } => format!("https://www.youtube.com/watch?v={id}"),
            MediaLink::Spotify { id } => format!("https://open.spotify.com/track/{id}"),
            MediaLink::Soundcloud { url } => url.clone(),
            MediaLink::Beatport { id } => {
                format!("https://embed.beatport.com/player/?id={id}&type=track")
            }
        }
    }
}

impl fmt::Display for MediaLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_urls() {
        let yt = MediaLink::Youtube {
            id: "dQw4w9WgXcQ".to_string(),
        };
        assert_eq!(yt.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(yt.provider(), "youtube");

        let bp = MediaLink::Beatport {
            id: "123".to_string(),
        };
        assert_eq!(
            bp.to_string(),
            "https://embed.beatport.com/player/?id=123&type=track"
        );
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let link = MediaLink::Soundcloud {
            url: "https://soundcloud.com/a/b".to_string(),
        };
        let json = serde_json::to_string(&link).unwrap();
        assert_eq!(json, r#"{"type":"soundcloud","url":"https://soundcloud.com/a/b"}"#);
    }
}
