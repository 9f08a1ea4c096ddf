// src/backend/http.rs

//! Backend that scrapes the live catalog site.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::backend::parse::{PageParser, PlayerSource};
use crate::backend::{Backend, FetchError, FetchResult};
use crate::error::Result;
use crate::models::{CrawlerConfig, Entity, EntityKind, MediaLink};
use crate::utils::http::{CookieJar, create_async_client, fetch_text};
use crate::utils::resolve_url;

const SOUNDCLOUD_WIDGET: &str = "https://w.soundcloud.com/player/?url=https://api.soundcloud.com/tracks/";

/// Fetches entity pages over HTTP and parses them with [`PageParser`].
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    media_delay: Duration,
    parser: PageParser,
    cookies: CookieJar,
}

impl HttpBackend {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            base_url: Url::parse(&config.base_url)?,
            media_delay: config.media_delay(),
            parser: PageParser::new()?,
            cookies: CookieJar::default(),
        })
    }

    fn entity_url(&self, kind: EntityKind, id: &str) -> String {
        resolve_url(&self.base_url, &format!("{}/{}/", kind.as_str(), id))
    }

    async fn get(&self, url: &str) -> FetchResult<String> {
        let cookie = self.cookies.next_guid();
        fetch_text(&self.client, url, Some(&cookie)).await
    }

    async fn fetch_track(&self, id: &str) -> FetchResult<Entity> {
        let html = self.get(&self.entity_url(EntityKind::Track, id)).await?;
        let page = self.parser.parse_track(id, &html)?;
        let mut track = page.track;

        for media_id in &page.media_ids {
            tokio::time::sleep(self.media_delay).await;
            match self.fetch_media(media_id).await {
                Ok(links) => {
                    for link in links {
                        if !track.medialinks.contains(&link) {
                            track.medialinks.push(link);
                        }
                    }
                }
                Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
                Err(e) => log::warn!("Could not get media link {} of track '{}': {}", media_id, id, e),
            }
        }

        Ok(track.into())
    }

    async fn fetch_media(&self, media_id: &str) -> FetchResult<Vec<MediaLink>> {
        let url = resolve_url(
            &self.base_url,
            &format!("ajax/get_medialink.php?idMedia={media_id}"),
        );
        let body = self.get(&url).await?;
        let sources = self.parser.media_player_sources(&body)?;

        let mut links = Vec::new();
        for src in sources {
            match self.parser.classify_player(&src) {
                PlayerSource::Link(link) => links.push(link),
                PlayerSource::SoundcloudTrack(track_id) => {
                    let widget = fetch_text(
                        &self.client,
                        &format!("{SOUNDCLOUD_WIDGET}{track_id}"),
                        None,
                    )
                    .await?;
                    match self.parser.soundcloud_permalink(&widget) {
                        Some(link) => links.push(link),
                        None => log::warn!("Could not resolve SoundCloud track {}", track_id),
                    }
                }
                PlayerSource::Unknown => log::warn!("Unknown media link: {}", src),
            }
        }
        Ok(links)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(&self, kind: EntityKind, id: &str) -> FetchResult<Entity> {
        log::debug!("Loading {} '{}'", kind, id);
        match kind {
            EntityKind::Track => self.fetch_track(id).await,
            EntityKind::Artist => {
                let html = self.get(&self.entity_url(kind, id)).await?;
                Ok(self.parser.parse_artist(id, &html)?.into())
            }
            EntityKind::Label => {
                let html = self.get(&self.entity_url(kind, id)).await?;
                Ok(self.parser.parse_label(id, &html)?.into())
            }
            EntityKind::Tracklist => {
                let html = self.get(&self.entity_url(kind, id)).await?;
                Ok(self.parser.parse_tracklist(id, &html)?.into())
            }
        }
    }
}
