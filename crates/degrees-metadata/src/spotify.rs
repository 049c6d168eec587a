//! HTTP [`Catalog`] over the Spotify Web API.
//!
//! Uses the client-credentials flow for tokens. One artist node costs
//! three concurrent requests (profile, top tracks, albums) plus one per
//! selected album for its track list; album track lists are cached on
//! their own so overlapping discographies are not refetched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use degrees_protocol::{Album, ArtistNode, ArtistRef, Image, NodeId, Track};
use futures_util::future::join_all;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    Catalog, HttpReply, MetadataError, PlaylistPage, RetryPolicy, TokenGrant, TtlCache,
    fetch_with_retry,
};

const TOP_TRACK_LIMIT: usize = 5;
const ALBUM_LIMIT: usize = 10;
const PLAYLIST_PAGE_SIZE: u32 = 100;
const CATALOG_ID_LEN: usize = 22;

/// Endpoints, credentials and limits for [`SpotifyCatalog`].
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Token endpoint.
    ///
    /// Default: `https://accounts.spotify.com/api/token`
    pub accounts_url: String,

    /// Base URL of the Web API, without a trailing slash.
    ///
    /// Default: `https://api.spotify.com/v1`
    pub api_base: String,

    /// Market used for top-track lookups.
    ///
    /// Default: `"US"`
    pub market: String,

    /// Per-request timeout.
    ///
    /// Default: 10 seconds
    pub timeout: Duration,

    /// How long an album's track list is reused.
    ///
    /// Default: 10 minutes
    pub album_ttl: Duration,

    pub retry: RetryPolicy,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            accounts_url: "https://accounts.spotify.com/api/token".into(),
            api_base: "https://api.spotify.com/v1".into(),
            market: "US".into(),
            timeout: Duration::from_secs(10),
            album_ttl: Duration::from_secs(10 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared request plumbing; cheap to clone into cached fetches.
#[derive(Clone)]
struct Http {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Http {
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        label: &str,
    ) -> Result<T, MetadataError> {
        let reply = fetch_with_retry(&self.retry, label, || {
            read_reply(self.client.get(url).bearer_auth(token))
        })
        .await?;
        decode(&reply)
    }
}

/// [`Catalog`] backed by the Spotify Web API.
pub struct SpotifyCatalog {
    http: Http,
    config: SpotifyConfig,
    album_tracks: TtlCache<String, Arc<Vec<Track>>>,
}

impl SpotifyCatalog {
    /// Builds the HTTP client.
    ///
    /// # Errors
    /// Returns `MetadataError::Transport` if the TLS backend cannot be
    /// initialised.
    pub fn new(config: SpotifyConfig) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        Ok(Self {
            http: Http {
                client,
                retry: config.retry.clone(),
            },
            config,
            album_tracks: TtlCache::new(),
        })
    }

    async fn tracks_for(&self, token: &str, album: &RawAlbum) -> Arc<Vec<Track>> {
        let http = self.http.clone();
        let url = format!("{}/albums/{}/tracks?limit=50", self.config.api_base, album.id);
        let token = token.to_owned();
        let ttl = self.config.album_ttl;

        let fetched = self
            .album_tracks
            .get_or_fetch(album.id.clone(), move || async move {
                let page: RawItems<RawTrack> = http.get_json(&url, &token, "album tracks").await?;
                let tracks = page.items.into_iter().map(Track::from).collect();
                Ok((Arc::new(tracks), ttl))
            })
            .await;

        match fetched {
            Ok(tracks) => tracks,
            Err(e) => {
                debug!(album = %album.name, error = %e, "album tracks unavailable");
                Arc::new(Vec::new())
            }
        }
    }
}

impl Catalog for SpotifyCatalog {
    async fn acquire_token(&self) -> Result<TokenGrant, MetadataError> {
        let (Some(id), Some(secret)) = (&self.config.client_id, &self.config.client_secret) else {
            return Err(MetadataError::MissingCredentials);
        };

        let reply = fetch_with_retry(&self.config.retry, "token", || {
            read_reply(
                self.http
                    .client
                    .post(&self.config.accounts_url)
                    .basic_auth(id, Some(secret))
                    .form(&[("grant_type", "client_credentials")]),
            )
        })
        .await?;

        let raw: RawToken = decode(&reply)?;
        Ok(TokenGrant {
            access_token: raw.access_token,
            expires_in: Duration::from_secs(raw.expires_in),
        })
    }

    async fn fetch_artist(&self, token: &str, id: &NodeId) -> Result<ArtistNode, MetadataError> {
        if !is_catalog_id(id.as_str()) {
            return Err(MetadataError::InvalidId(id.to_string()));
        }
        let base = &self.config.api_base;
        let profile_url = format!("{base}/artists/{id}");
        let top_url = format!("{base}/artists/{id}/top-tracks?market={}", self.config.market);
        let albums_url = format!("{base}/artists/{id}/albums?limit=50&include_groups=album,single");

        let (profile, top, albums) = tokio::try_join!(
            self.http.get_json::<RawArtist>(&profile_url, token, "artist"),
            self.http.get_json::<RawTopTracks>(&top_url, token, "top tracks"),
            self.http.get_json::<RawItems<RawAlbum>>(&albums_url, token, "albums"),
        )?;

        let selected = select_albums(albums.items);
        let track_lists = join_all(selected.iter().map(|album| self.tracks_for(token, album))).await;
        let albums = selected.into_iter().zip(track_lists).collect();

        let node = assemble_artist(profile, top.tracks, albums);
        debug!(artist = %node.id, albums = node.albums.len(), "artist assembled");
        Ok(node)
    }

    async fn playlist_page(
        &self,
        token: &str,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<PlaylistPage, MetadataError> {
        let url = match cursor {
            Some(next) => next.to_owned(),
            None => format!(
                "{}/playlists/{playlist_id}/tracks?limit={PLAYLIST_PAGE_SIZE}",
                self.config.api_base
            ),
        };
        let raw: RawPlaylistPage = self.http.get_json(&url, token, "playlist").await?;

        let artist_ids = raw
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .flat_map(|track| track.artists)
            .filter_map(|artist| artist.id)
            .map(NodeId::from)
            .collect();
        Ok(PlaylistPage {
            artist_ids,
            next: raw.next,
        })
    }
}

async fn read_reply(request: reqwest::RequestBuilder) -> Result<HttpReply, MetadataError> {
    let response = request
        .send()
        .await
        .map_err(|e| MetadataError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after);
    let body = response
        .bytes()
        .await
        .map_err(|e| MetadataError::Transport(e.to_string()))?
        .to_vec();
    Ok(HttpReply {
        status,
        retry_after,
        body,
    })
}

/// Spotify ids are 22 base62 characters. Anything else never reaches a URL.
fn is_catalog_id(id: &str) -> bool {
    id.len() == CATALOG_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// `Retry-After` in its delta-seconds form. HTTP dates are ignored and
/// fall back to the policy default.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn decode<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, MetadataError> {
    serde_json::from_slice(&reply.body).map_err(|e| MetadataError::Decode(e.to_string()))
}

// Upstream payloads. Only the fields the node model uses are read.

#[derive(Debug, Deserialize)]
struct RawToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct RawItems<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawArtistRef {
    id: Option<String>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawFollowers {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawArtist {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
    popularity: Option<u32>,
    followers: Option<RawFollowers>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    id: Option<String>,
    name: String,
    preview_url: Option<String>,
    popularity: Option<u32>,
    track_number: Option<u32>,
    #[serde(default)]
    artists: Vec<RawArtistRef>,
}

#[derive(Debug, Deserialize)]
struct RawTopTracks {
    #[serde(default)]
    tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    id: String,
    name: String,
    release_date: Option<String>,
    total_tracks: Option<u32>,
    album_type: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistItem {
    track: Option<RawPlaylistTrack>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistTrack {
    #[serde(default)]
    artists: Vec<RawArtistRef>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistPage {
    #[serde(default)]
    items: Vec<RawPlaylistItem>,
    next: Option<String>,
}

impl From<RawArtistRef> for ArtistRef {
    fn from(raw: RawArtistRef) -> Self {
        ArtistRef::new(raw.id.map(NodeId::from), raw.name)
    }
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        Track {
            id: raw.id,
            name: raw.name,
            preview_url: raw.preview_url,
            popularity: raw.popularity,
            track_number: raw.track_number,
            artists: raw.artists.into_iter().map(ArtistRef::from).collect(),
        }
    }
}

/// First album per distinct name, in upstream order, at most
/// [`ALBUM_LIMIT`].
fn select_albums(items: Vec<RawAlbum>) -> Vec<RawAlbum> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|album| seen.insert(album.name.clone()))
        .take(ALBUM_LIMIT)
        .collect()
}

fn assemble_artist(
    profile: RawArtist,
    top_tracks: Vec<RawTrack>,
    albums: Vec<(RawAlbum, Arc<Vec<Track>>)>,
) -> ArtistNode {
    ArtistNode {
        id: NodeId::from(profile.id),
        name: profile.name,
        genres: profile.genres,
        popularity: profile.popularity,
        followers: profile.followers.and_then(|f| f.total),
        images: profile.images,
        top_tracks: top_tracks
            .into_iter()
            .take(TOP_TRACK_LIMIT)
            .map(Track::from)
            .collect(),
        albums: albums
            .into_iter()
            .map(|(album, tracks)| Album {
                id: album.id,
                name: album.name,
                release_date: album.release_date,
                total_tracks: album.total_tracks,
                album_type: album.album_type,
                images: album.images,
                tracks: tracks.as_ref().clone(),
                expandable: true,
            })
            .collect(),
    }
}
