use lofty::{ItemKey, Tag, TagExt, TaggedFileExt};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The descriptive fields the pipeline cares about. A field holding a
/// non-empty value is never overwritten by inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
    pub genre: Option<String>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.track.is_none()
            && self.genre.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.artist.is_some()
            && self.album.is_some()
            && self.track.is_some()
            && self.genre.is_some()
    }

    pub fn from_lofty(tag: &Tag) -> Self {
        Self {
            title: text_item(tag, &ItemKey::TrackTitle),
            artist: text_item(tag, &ItemKey::TrackArtist),
            album: text_item(tag, &ItemKey::AlbumTitle),
            track: text_item(tag, &ItemKey::TrackNumber).and_then(|s| parse_track(&s)),
            genre: text_item(tag, &ItemKey::Genre),
        }
    }
}

fn text_item(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// Track numbers are often stored as "5/12".
fn parse_track(value: &str) -> Option<u32> {
    value.split('/').next()?.trim().parse().ok()
}

#[derive(Debug, Error)]
#[error("failed to write tags to {path}: {reason}")]
pub struct TagWriteError {
    pub path: PathBuf,
    pub reason: String,
}

impl TagWriteError {
    fn new(path: &Path, reason: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Writes the given fields into the file's primary tag, skipping any field
/// the file already has a value for. Returns the names of the fields that
/// were actually written; nothing is saved when that set is empty.
pub fn write_missing(path: &Path, fill: &TagSet) -> Result<Vec<String>, TagWriteError> {
    let mut tagged = lofty::Probe::open(path)
        .map_err(|err| TagWriteError::new(path, &err))?
        .read()
        .map_err(|err| TagWriteError::new(path, &err))?;

    let tag_type = tagged.primary_tag_type();
    if tagged.tag(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged.tag_mut(tag_type) else {
        return Err(TagWriteError::new(path, "no writable tag"));
    };

    let mut written = Vec::new();
    if let Some(title) = &fill.title {
        if text_item(tag, &ItemKey::TrackTitle).is_none() {
            tag.insert_text(ItemKey::TrackTitle, title.clone());
            written.push("title");
        }
    }
    if let Some(artist) = &fill.artist {
        if text_item(tag, &ItemKey::TrackArtist).is_none() {
            tag.insert_text(ItemKey::TrackArtist, artist.clone());
            written.push("artist");
        }
    }
    if let Some(album) = &fill.album {
        if text_item(tag, &ItemKey::AlbumTitle).is_none() {
            tag.insert_text(ItemKey::AlbumTitle, album.clone());
            written.push("album");
        }
    }
    if let Some(track) = fill.track {
        if text_item(tag, &ItemKey::TrackNumber).is_none() {
            tag.insert_text(ItemKey::TrackNumber, track.to_string());
            written.push("track");
        }
    }
    if let Some(genre) = &fill.genre {
        if text_item(tag, &ItemKey::Genre).is_none() {
            tag.insert_text(ItemKey::Genre, genre.clone());
            written.push("genre");
        }
    }

    if written.is_empty() {
        return Ok(Vec::new());
    }
    tag.save_to_path(path)
        .map_err(|err| TagWriteError::new(path, &err))?;
    Ok(written.into_iter().map(String::from).collect())
}
