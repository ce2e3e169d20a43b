// Domain objects returned by the Last.fm client
// All of these are plain values with no back-reference to the client.

use chrono::{DateTime, Utc};

/// Credentials obtained once via user authorization, read by every
/// signed call afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmSession {
    pub session_key: String,
    pub username: String,
}

/// The logged-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmUserInfo {
    pub username: String,
    /// `None` when the profile has no real name set (the wire sends "").
    pub real_name: Option<String>,
    pub image_url: String,
    pub url: String,
    pub registered_date: DateTime<Utc>,
    pub total_scrobbles: u32,
}

/// Another user, as returned by the friends listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmUser {
    pub url: String,
    pub username: String,
    pub real_name: Option<String>,
    pub image_url: String,
}

/// A tag attached to an artist, track or album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmTag {
    pub name: String,
    pub url: String,
}

/// Identity reference to an artist, used where a full artist object
/// would be overkill (track and album ownership).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmArtistLink {
    pub name: String,
    /// Absent for album lookups, where the wire only carries a name.
    pub url: Option<String>,
}

/// Artist details. Which fields are populated depends on the endpoint:
/// top-artist listings carry only name, url and the user's play count,
/// while `artist.getInfo` fills everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastfmArtist {
    pub name: String,
    pub url: Option<String>,
    /// The requesting user's play count.
    pub plays: Option<u32>,
    pub global_listeners: Option<u32>,
    pub global_plays: Option<u32>,
    pub bio: Option<String>,
    pub tags: Vec<LastfmTag>,
    pub similar_artists: Vec<LastfmArtist>,
}

/// Track details from `track.getInfo` or a top-tracks listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmTrack {
    pub url: String,
    pub title: String,
    pub artist_link: LastfmArtistLink,
    pub plays: Option<u32>,
    pub is_loved: Option<bool>,
    pub global_listeners: Option<u32>,
    pub global_plays: Option<u32>,
    pub tags: Vec<LastfmTag>,
}

/// Small/medium artwork URLs. Selection from the wire's image array is
/// positional (index 1 and last index); the declared size labels are not
/// trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub small_url: Option<String>,
    pub medium_url: Option<String>,
}

/// Album details from `album.getInfo` or a top-albums listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmAlbum {
    pub url: Option<String>,
    pub title: String,
    pub artist_link: LastfmArtistLink,
    pub image_set: ImageSet,
    pub plays: Option<u32>,
    pub global_listeners: Option<u32>,
    pub global_plays: Option<u32>,
    pub tags: Vec<LastfmTag>,
}

/// A completed play, identified by its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmScrobble {
    pub artist_name: String,
    pub track_title: String,
    pub album_title: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A friend's latest track: either currently playing (no timestamp) or a
/// past scrobble no older than 24 hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendScrobble {
    pub url: String,
    pub track_title: String,
    pub artist_name: String,
    pub artist_url: String,
    pub album_title: Option<String>,
    pub is_loved: bool,
    pub is_playing: bool,
}

/// A page of items together with the total count the server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastfmList<T> {
    pub items: Vec<T>,
    pub attr_total: u32,
}

/// Result of a write operation. The HTTP call succeeded; `ignored_error_code`
/// is set when the service nevertheless rejected the content (duplicate
/// scrobble, stale now-playing and so on).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastfmSubmissionStatus {
    pub accepted_count: u32,
    pub ignored_count: Option<u32>,
    pub ignored_error_code: Option<u32>,
}

/// Time window for the top-artist/track/album charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Overall,
    Week,
    Month,
    ThreeMonths,
    SixMonths,
    Year,
}

impl Period {
    /// Wire value expected by the `period` parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Overall => "overall",
            Period::Week => "7day",
            Period::Month => "1month",
            Period::ThreeMonths => "3month",
            Period::SixMonths => "6month",
            Period::Year => "12month",
        }
    }
}
