//! The node model: artists and the tracks/albums that link them.
//!
//! A node is fetched from the upstream catalog once per cache lifetime and
//! treated as immutable afterwards, so sessions share it behind an `Arc`.
//! Every [`ArtistRef`] with an id is a clickable edge to another node.

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A cover or profile image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// An artist credited on a track.
///
/// `clickable` is `false` for credits the catalog cannot resolve to an
/// artist id (local files, unlinked features); those are not edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: Option<NodeId>,
    pub name: String,
    pub clickable: bool,
}

impl ArtistRef {
    /// Builds a reference, deriving `clickable` from whether an id exists.
    pub fn new(id: Option<NodeId>, name: impl Into<String>) -> Self {
        Self {
            clickable: id.is_some(),
            id,
            name: name.into(),
        }
    }
}

/// A track, either from an artist's top list or from an album.
///
/// Track and album fields keep the upstream's snake_case names on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    pub preview_url: Option<String>,
    pub popularity: Option<u32>,
    pub track_number: Option<u32>,
    /// Credited artists; the first one is the main artist.
    pub artists: Vec<ArtistRef>,
}

/// An album or single together with its ordered track list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    pub album_type: Option<String>,
    pub images: Vec<Image>,
    pub tracks: Vec<Track>,
    pub expandable: bool,
}

/// One explorable node: an artist with bounded top tracks and albums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistNode {
    pub id: NodeId,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub followers: Option<u64>,
    pub images: Vec<Image>,
    pub top_tracks: Vec<Track>,
    pub albums: Vec<Album>,
}

impl ArtistNode {
    /// A node with only an id and a name. Handy for tests and fakes.
    pub fn bare(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genres: Vec::new(),
            popularity: None,
            followers: None,
            images: Vec::new(),
            top_tracks: Vec::new(),
            albums: Vec::new(),
        }
    }
}
