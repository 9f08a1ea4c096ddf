//! Markup extraction for the tracklist site.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so a page is
//! parsed and dropped before the caller awaits anything else.

use std::collections::BTreeSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::backend::{FetchError, FetchResult};
use crate::error::{AppError, Result};
use crate::models::{Artist, EntityKind, Label, MediaLink, Track, Tracklist};
use crate::utils::entity_id_from_href;

/// A parsed track page, plus the media players still to be resolved.
#[derive(Debug)]
pub struct TrackPage {
    pub track: Track,
    pub media_ids: Vec<String>,
}

/// What an embedded player iframe points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSource {
    Link(MediaLink),
    /// SoundCloud API track id; its permalink needs another request
    SoundcloudTrack(String),
    Unknown,
}

/// Compiled selectors and patterns for every page type.
pub struct PageParser {
    meta_name: Selector,
    meta_duration: Selector,
    side: Selector,
    side_top_th: Selector,
    side_top_link: Selector,
    default_table: Selector,
    th: Selector,
    tr: Selector,
    anchor: Selector,
    track_tracklists: Selector,
    media_link: Selector,
    iframe: Selector,
    label_name: Selector,
    artist_name: Selector,
    artist_tables: Selector,
    tracklist_tracks: Selector,
    youtube: Regex,
    soundcloud_api: Regex,
    spotify: Regex,
    beatport: Regex,
    soundcloud_permalink: Regex,
}

const TRACK_MODE_HEADINGS: [&str; 3] = [
    "Remixes",
    "Mashups / Bootlegs",
    "Track Is A Mashup Containing These Tracks",
];

const ARTIST_MODE_HEADINGS: [&str; 3] = ["Tracks", "Remixes", "Mashups"];

#[derive(Deserialize)]
struct MediaResponse {
    #[serde(default)]
    data: Vec<MediaPlayer>,
}

#[derive(Deserialize)]
struct MediaPlayer {
    #[serde(default)]
    player: String,
}

impl PageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            meta_name: parse_selector(r#"body > meta[itemprop="name"]"#)?,
            meta_duration: parse_selector(r#"body > meta[itemprop="duration"]"#)?,
            side: parse_selector("div.side")?,
            side_top_th: parse_selector("table.sideTop th")?,
            side_top_link: parse_selector("table.sideTop th a")?,
            default_table: parse_selector("table.default")?,
            th: parse_selector("th")?,
            tr: parse_selector("tr")?,
            anchor: parse_selector("a[href]")?,
            track_tracklists: parse_selector("#middleDiv .tlTbl tr .tlLink a")?,
            media_link: parse_selector("div.mediaLink[data-idmedia]")?,
            iframe: parse_selector("iframe[src]")?,
            label_name: parse_selector("#leftDiv .sideTop th")?,
            artist_name: parse_selector("#leftContent .side table.sideTop th")?,
            artist_tables: parse_selector("#leftContent .side > table.default")?,
            tracklist_tracks: parse_selector(
                r#".tl tr.tlpItem div.tlToogleData meta[itemprop="url"]"#,
            )?,
            youtube: Regex::new(r"^https?://www\.youtube\.com/embed/([^?/]+)")?,
            soundcloud_api: Regex::new(r"https?://api\.soundcloud\.com/tracks/([0-9]+)")?,
            spotify: Regex::new(r"^https?://open\.spotify\.com/embed/track/([^?/]+)")?,
            beatport: Regex::new(r"^https?://embed\.beatport\.com/player/?\?id=([0-9]+)")?,
            soundcloud_permalink: Regex::new(r#""permalink_url":"([^"]+)""#)?,
        })
    }

    /// Parse a track page.
    pub fn parse_track(&self, id: &str, html: &str) -> FetchResult<TrackPage> {
        let doc = Html::parse_document(html);
        let name = meta_content(&doc, &self.meta_name)
            .ok_or_else(|| unrecognized(EntityKind::Track, id))?;

        let mut track = Track::new(id, name);
        track.duration = meta_content(&doc, &self.meta_duration);
        if track.duration.is_none() {
            log::debug!("Duration not set for track '{}'", id);
        }

        self.parse_track_sides(&doc, &mut track);

        for link in doc.select(&self.track_tracklists) {
            if let Some(tracklist) = link_id(link) {
                track.tracklists.insert(tracklist);
            }
        }

        for (mode, target) in self.mode_table_links(&doc, &TRACK_MODE_HEADINGS) {
            match mode.as_str() {
                "Remixes" => track.remixes.insert(target),
                "Mashups / Bootlegs" => track.mashups.insert(target),
                "Track Is A Mashup Containing These Tracks" => track.mashup_tracks.insert(target),
                other => {
                    log::debug!("Unknown track mode '{}' on track '{}'", other, id);
                    false
                }
            };
        }

        let media_ids = doc
            .select(&self.media_link)
            .filter_map(|div| div.value().attr("data-idmedia"))
            .map(str::to_string)
            .collect();

        Ok(TrackPage { track, media_ids })
    }

    /// Side boxes: one per artist, one for the track itself (labels, remix
    /// origin) and an optional credits box.
    fn parse_track_sides(&self, doc: &Html, track: &mut Track) {
        for side in doc.select(&self.side) {
            let Some(header) = side.select(&self.side_top_th).next().and_then(first_text) else {
                continue;
            };

            if header == track.name {
                for table in side.select(&self.default_table) {
                    let Some(th) = table.select(&self.th).next() else {
                        continue;
                    };
                    let subheader = last_text(th).unwrap_or_default();
                    match subheader.as_str() {
                        "Remix Of" | "Rework Of" => {
                            if let Some(target) = self.first_link_id(table) {
                                track.remix_of.insert(target);
                            }
                        }
                        "Label" => {
                            if let Some(label) = self.first_link_id(table) {
                                track.labels.insert(label);
                            }
                        }
                        "Short Link" | "Statistics" | "Supported By" => {}
                        s if s == track.name => {}
                        other => log::debug!("Omitting side table '{}'", other),
                    }
                }
            } else if header == "Additional Credits" {
                continue;
            } else if let Some(artist) = side.select(&self.side_top_link).next().and_then(link_id)
            {
                track.artists.insert(artist);
            }
        }
    }

    /// Parse an artist page.
    pub fn parse_artist(&self, id: &str, html: &str) -> FetchResult<Artist> {
        let doc = Html::parse_document(html);
        let name = doc
            .select(&self.artist_name)
            .next()
            .and_then(first_text)
            .ok_or_else(|| unrecognized(EntityKind::Artist, id))?;
        let mut artist = Artist::new(id, name);

        for table in doc.select(&self.artist_tables) {
            if table.value().classes().any(|c| c == "sideTop") {
                continue;
            }
            let Some(header) = table.select(&self.th).next().and_then(first_text) else {
                continue;
            };

            let (target, rows_need_class): (&mut BTreeSet<String>, bool) = match header.as_str()
            {
                "Is Part Of" => (&mut artist.part_of, false),
                "Part Members" => (&mut artist.members, true),
                "Aliases" => (&mut artist.aliases, false),
                "Short Link" => continue,
                other => {
                    log::debug!("Did not use artist table '{}'", other);
                    continue;
                }
            };

            for row in table.select(&self.tr) {
                if row.select(&self.th).next().is_some() {
                    continue;
                }
                if rows_need_class && row.value().attr("class").is_none() {
                    continue;
                }
                if let Some(linked) = self.first_link_id(row) {
                    target.insert(linked);
                }
            }
        }

        for (mode, target) in self.mode_table_links(&doc, &ARTIST_MODE_HEADINGS) {
            match mode.as_str() {
                "Tracks" => artist.tracks.insert(target),
                "Remixes" => artist.remixes.insert(target),
                "Mashups" => artist.mashups.insert(target),
                "Featured Tracks" => artist.tracks_featured.insert(target),
                "Presented Tracks" => artist.tracks_presented.insert(target),
                other => {
                    log::debug!("Unknown track mode '{}' on artist '{}'", other, id);
                    false
                }
            };
        }

        Ok(artist)
    }

    /// Parse a label page.
    pub fn parse_label(&self, id: &str, html: &str) -> FetchResult<Label> {
        let doc = Html::parse_document(html);
        let name = doc
            .select(&self.label_name)
            .next()
            .and_then(first_text)
            .ok_or_else(|| unrecognized(EntityKind::Label, id))?;
        Ok(Label::new(id, name))
    }

    /// Parse a tracklist page.
    pub fn parse_tracklist(&self, id: &str, html: &str) -> FetchResult<Tracklist> {
        let doc = Html::parse_document(html);
        let name = meta_content(&doc, &self.meta_name)
            .ok_or_else(|| unrecognized(EntityKind::Tracklist, id))?;
        let mut tracklist = Tracklist::new(id, name);

        for meta in doc.select(&self.tracklist_tracks) {
            if let Some(track) = meta.value().attr("content").and_then(entity_id_from_href) {
                tracklist.tracks.insert(track);
            }
        }
        Ok(tracklist)
    }

    /// Iframe sources from a media-link endpoint response.
    pub fn media_player_sources(&self, body: &str) -> FetchResult<Vec<String>> {
        let response: MediaResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::connection(format!("bad media response: {e}")))?;

        let mut sources = Vec::new();
        for player in response.data {
            let fragment = Html::parse_fragment(&player.player);
            sources.extend(
                fragment
                    .select(&self.iframe)
                    .filter_map(|iframe| iframe.value().attr("src"))
                    .map(str::to_string),
            );
        }
        Ok(sources)
    }

    /// Classify an embedded player source.
    pub fn classify_player(&self, src: &str) -> PlayerSource {
        let capture = |re: &Regex| {
            re.captures(src)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        if let Some(id) = capture(&self.youtube) {
            PlayerSource::Link(MediaLink::Youtube { id })
        } else if let Some(id) = capture(&self.soundcloud_api) {
            PlayerSource::SoundcloudTrack(id)
        } else if let Some(id) = capture(&self.spotify) {
            PlayerSource::Link(MediaLink::Spotify { id })
        } else if let Some(id) = capture(&self.beatport) {
            PlayerSource::Link(MediaLink::Beatport { id })
        } else {
            PlayerSource::Unknown
        }
    }

    /// Permalink from a SoundCloud widget page.
    pub fn soundcloud_permalink(&self, body: &str) -> Option<MediaLink> {
        self.soundcloud_permalink
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| MediaLink::Soundcloud {
                url: m.as_str().replace("\\/", "/"),
            })
    }

    /// Rows of the first table whose heading matches one of `headings`,
    /// tagged with the sub-heading ("mode") they appear under.
    fn mode_table_links(&self, doc: &Html, headings: &[&str]) -> Vec<(String, String)> {
        let Some(heading) = doc.select(&self.th).find(|th| {
            let text: String = th.text().collect();
            headings.iter().any(|h| text.contains(h))
        }) else {
            return Vec::new();
        };
        let Some(table) = heading
            .parent()
            .and_then(|row| row.parent())
            .and_then(ElementRef::wrap)
        else {
            return Vec::new();
        };

        let mut mode = String::new();
        let mut links = Vec::new();
        for row in table.children().filter_map(ElementRef::wrap) {
            if row.value().name() != "tr" {
                continue;
            }
            if let Some(th) = row.select(&self.th).next() {
                mode = th.text().collect::<String>().trim().to_string();
                continue;
            }
            if row.value().classes().any(|c| c == "adRow") {
                continue;
            }
            if let Some(target) = self.first_link_id(row) {
                links.push((mode.clone(), target));
            }
        }
        links
    }

    fn first_link_id(&self, element: ElementRef) -> Option<String> {
        element.select(&self.anchor).find_map(link_id)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn unrecognized(kind: EntityKind, id: &str) -> FetchError {
    FetchError::connection(format!("unrecognized {kind} page for '{id}'"))
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_text(element: ElementRef) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn last_text(element: ElementRef) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
        .map(str::to_string)
}

fn link_id(element: ElementRef) -> Option<String> {
    element.value().attr("href").and_then(entity_id_from_href)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK_PAGE: &str = r#"<html><body>
<meta itemprop="name" content="Song Title">
<meta itemprop="duration" content="PT5M32S">
<div id="leftDiv">
  <div class="side"><table class="sideTop"><tr><th><a href="/artist/art1/dj-one/">DJ One</a></th></tr></table></div>
  <div class="side">
    <table class="sideTop default"><tr><th>Song Title</th></tr></table>
    <table class="default"><tr><th>Remix Of</th></tr><tr><td><a href="/track/orig1/original/">Original</a></td></tr></table>
    <table class="default"><tr><th>Label</th></tr><tr><td><a href="/label/lab1/label-name/">Label</a></td></tr></table>
    <table class="default"><tr><th>Statistics</th></tr></table>
  </div>
  <div class="side"><table class="sideTop"><tr><th>Additional Credits</th></tr></table></div>
</div>
<div id="middleDiv">
  <table class="tlTbl"><tr><td class="tlLink"><a href="/tracklist/tl9/some-set/">Set</a></td></tr></table>
  <table class="default">
    <tr><th>Remixes</th></tr>
    <tr><td><a href="/track/rmx1/remix/">Remix</a></td></tr>
    <tr class="adRow"><td><a href="/track/ad/ad/">Ad</a></td></tr>
    <tr><th>Mashups / Bootlegs</th></tr>
    <tr><td><a href="/track/mash1/mashup/">Mashup</a></td></tr>
  </table>
  <div class="mediaLink" data-idmedia="m42"></div>
</div>
</body></html>"#;

    const ARTIST_PAGE: &str = r#"<html><body>
<div id="leftContent"><div class="side">
  <table class="sideTop default"><tr><th>Group Name</th></tr></table>
  <table class="default"><tr><th>Part Members</th></tr>
    <tr class="row"><td><a href="/artist/m1/member/">M1</a></td></tr>
    <tr><td><a href="/artist/noclass/x/">No class</a></td></tr></table>
  <table class="default"><tr><th>Is Part Of</th></tr><tr><td><a href="/artist/g2/group/">G2</a></td></tr></table>
  <table class="default"><tr><th>Aliases</th></tr><tr><td><a href="/artist/al1/alias/">Alias</a></td></tr></table>
  <table class="default"><tr><th>Short Link</th></tr><tr><td><a href="/artist/short/x/">Short</a></td></tr></table>
</div></div>
<div id="middleDiv"><table class="default">
  <tr><th>Tracks</th></tr><tr><td><a href="/track/t1/x/">T1</a></td></tr>
  <tr><th>Remixes</th></tr><tr><td><a href="/track/t2/x/">T2</a></td></tr>
  <tr><th>Featured Tracks</th></tr><tr><td><a href="/track/t3/x/">T3</a></td></tr>
</table></div>
</body></html>"#;

    fn parser() -> PageParser {
        PageParser::new().unwrap()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_track() {
        let page = parser().parse_track("t0", TRACK_PAGE).unwrap();
        let track = page.track;

        assert_eq!(track.name, "Song Title");
        assert_eq!(track.duration.as_deref(), Some("PT5M32S"));
        assert_eq!(track.artists, set(&["art1"]));
        assert_eq!(track.labels, set(&["lab1"]));
        assert_eq!(track.remix_of, set(&["orig1"]));
        assert_eq!(track.tracklists, set(&["tl9"]));
        assert_eq!(track.remixes, set(&["rmx1"]));
        assert_eq!(track.mashups, set(&["mash1"]));
        assert!(track.mashup_tracks.is_empty());
        assert_eq!(page.media_ids, vec!["m42".to_string()]);
    }

    #[test]
    fn test_parse_track_without_name_is_rejected() {
        let result = parser().parse_track("t0", "<html><body><p>Blocked</p></body></html>");
        assert!(matches!(result, Err(FetchError::Connection(_))));
    }

    #[test]
    fn test_parse_artist() {
        let artist = parser().parse_artist("g1", ARTIST_PAGE).unwrap();

        assert_eq!(artist.name, "Group Name");
        assert_eq!(artist.members, set(&["m1"]));
        assert_eq!(artist.part_of, set(&["g2"]));
        assert_eq!(artist.aliases, set(&["al1"]));
        assert_eq!(artist.tracks, set(&["t1"]));
        assert_eq!(artist.remixes, set(&["t2"]));
        assert_eq!(artist.tracks_featured, set(&["t3"]));
    }

    #[test]
    fn test_parse_label() {
        let html = r#"<html><body><div id="leftDiv"><div class="side">
            <table class="sideTop"><tr><th> Label Name <span>extra</span></th></tr></table>
            </div></div></body></html>"#;
        let label = parser().parse_label("l1", html).unwrap();
        assert_eq!(label, Label::new("l1", "Label Name"));
    }

    #[test]
    fn test_parse_tracklist() {
        let html = r#"<html><body>
<meta itemprop="name" content="DJ @ Festival 2020">
<div class="tl"><table>
  <tr class="tlpItem"><td><div class="tlToogleData"><meta itemprop="url" content="/track/abc1/song/"></div></td></tr>
  <tr class="tlpItem"><td><div class="tlToogleData"><meta itemprop="url" content="https://www.1001tracklists.com/track/abc2/other/"></div></td></tr>
</table></div>
</body></html>"#;
        let tracklist = parser().parse_tracklist("T1", html).unwrap();
        assert_eq!(tracklist.name, "DJ @ Festival 2020");
        assert_eq!(tracklist.tracks, set(&["abc1", "abc2"]));
    }

    #[test]
    fn test_classify_player() {
        let p = parser();
        assert_eq!(
            p.classify_player("https://www.youtube.com/embed/abc123?autoplay=1"),
            PlayerSource::Link(MediaLink::Youtube {
                id: "abc123".to_string()
            })
        );
        assert_eq!(
            p.classify_player("https://open.spotify.com/embed/track/6rqhFgbbKwnb9MLmUQDhG6"),
            PlayerSource::Link(MediaLink::Spotify {
                id: "6rqhFgbbKwnb9MLmUQDhG6".to_string()
            })
        );
        assert_eq!(
            p.classify_player("https://embed.beatport.com/player/?id=998&type=track"),
            PlayerSource::Link(MediaLink::Beatport {
                id: "998".to_string()
            })
        );
        assert_eq!(
            p.classify_player(
                "https://w.soundcloud.com/player/?url=https://api.soundcloud.com/tracks/777&auto_play=true"
            ),
            PlayerSource::SoundcloudTrack("777".to_string())
        );
        assert_eq!(p.classify_player("https://example.com/x"), PlayerSource::Unknown);
    }

    #[test]
    fn test_media_player_sources() {
        let body = r#"{"success":true,"data":[{"player":"<iframe src=\"https://www.youtube.com/embed/yt1\"></iframe>"},{"player":"<div></div>"}]}"#;
        let sources = parser().media_player_sources(body).unwrap();
        assert_eq!(sources, vec!["https://www.youtube.com/embed/yt1".to_string()]);
    }

    #[test]
    fn test_soundcloud_permalink() {
        let body = r#"{"kind":"track","permalink_url":"https:\/\/soundcloud.com\/artist\/song","id":1}"#;
        assert_eq!(
            parser().soundcloud_permalink(body),
            Some(MediaLink::Soundcloud {
                url: "https://soundcloud.com/artist/song".to_string()
            })
        );
    }
}
