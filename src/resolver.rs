use crate::config::InferenceRules;
use crate::tags::TagSet;
use std::path::Path;

/// Infers missing tag fields from the file's name and directory layout.
/// Returns only the newly inferred fields; existing non-empty values are
/// never replaced, and fields that cannot be inferred stay absent. Paths
/// should be relative to the scan root so root directories are not
/// mistaken for artist names.
pub fn resolve(existing: &TagSet, path: &Path, rules: &InferenceRules) -> TagSet {
    let mut inferred = TagSet::default();
    let separator = rules.separator.as_str();

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        let mut rest = stem;

        // Leading zero-padded track numbers: "05 - Title".
        if !separator.is_empty() {
            if let Some((lead, tail)) = rest.split_once(separator) {
                let lead = lead.trim();
                if let Ok(number) = lead.parse::<u32>() {
                    if number > 0 && lead.chars().all(|c| c.is_ascii_digit()) {
                        if existing.track.is_none() {
                            inferred.track = Some(number);
                        }
                        rest = tail;
                    }
                }
            }
        }

        // "Artist - Title", keeping any further separators in the title.
        let (artist_part, title_part) = if separator.is_empty() {
            (None, rest.trim())
        } else {
            match rest.split_once(separator) {
                Some((artist, title)) => (Some(artist.trim()), title.trim()),
                None => (None, rest.trim()),
            }
        };

        if existing.title.is_none() && !title_part.is_empty() {
            inferred.title = Some(title_part.to_string());
        }
        if existing.artist.is_none() {
            if let Some(artist) = artist_part {
                if !artist.is_empty() && !rules.is_placeholder(artist) {
                    inferred.artist = Some(artist.to_string());
                }
            }
        }
    }

    // The Artist/Album/file convention.
    let album_dir = path.parent();
    let artist_dir = album_dir.and_then(Path::parent);
    if existing.album.is_none() && inferred.album.is_none() {
        if let Some(album) = usable_dir_name(album_dir, rules) {
            inferred.album = Some(album.to_string());
        }
    }
    if existing.artist.is_none() && inferred.artist.is_none() {
        if let Some(artist) = usable_dir_name(artist_dir, rules) {
            inferred.artist = Some(artist.to_string());
        }
    }

    inferred
}

fn usable_dir_name<'a>(dir: Option<&'a Path>, rules: &InferenceRules) -> Option<&'a str> {
    dir.and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty() && !rules.is_placeholder(name))
}
