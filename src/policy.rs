use crate::config::EncodeTarget;
use crate::probe::{Codec, FileRecord};

/// Absorbs encoder rounding when comparing probed bitrate to the target.
pub const BITRATE_TOLERANCE_KBPS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDecision {
    Skip,
    Convert { bitrate_kbps: u32 },
    ConvertAndRepair { bitrate_kbps: u32 },
    RepairTags,
    Reject { reason: String },
}

/// Maps a probed record to the work it needs. Codec/bitrate compliance is
/// checked before anything else so compliant files are never re-encoded
/// just to fix tags.
pub fn decide(record: &FileRecord, target: &EncodeTarget) -> ActionDecision {
    if record.codec == Codec::Unknown {
        return ActionDecision::Reject {
            reason: "unsupported or unrecognized container".to_string(),
        };
    }

    let compliant = record.codec == target.codec
        && record
            .bitrate_kbps
            .is_some_and(|kbps| kbps <= target.bitrate_kbps + BITRATE_TOLERANCE_KBPS);

    if compliant {
        if record.tags.is_complete() {
            ActionDecision::Skip
        } else {
            ActionDecision::RepairTags
        }
    } else if record.tags.is_complete() {
        ActionDecision::Convert {
            bitrate_kbps: target.bitrate_kbps,
        }
    } else {
        ActionDecision::ConvertAndRepair {
            bitrate_kbps: target.bitrate_kbps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagSet;
    use std::path::PathBuf;

    fn full_tags() -> TagSet {
        TagSet {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            album: Some("Record".to_string()),
            track: Some(1),
            genre: Some("Rock".to_string()),
        }
    }

    fn record(codec: Codec, bitrate_kbps: Option<u32>, tags: TagSet) -> FileRecord {
        FileRecord {
            path: PathBuf::from("song.mp3"),
            codec,
            bitrate_kbps,
            tags,
            size_bytes: 1024,
        }
    }

    fn target() -> EncodeTarget {
        EncodeTarget {
            codec: Codec::Mp3,
            bitrate_kbps: 256,
        }
    }

    #[test]
    fn compliant_and_fully_tagged_skips() {
        let rec = record(Codec::Mp3, Some(256), full_tags());
        assert_eq!(decide(&rec, &target()), ActionDecision::Skip);
    }

    #[test]
    fn compliant_with_missing_tags_repairs_without_reencoding() {
        let rec = record(Codec::Mp3, Some(192), TagSet::default());
        assert_eq!(decide(&rec, &target()), ActionDecision::RepairTags);
    }

    #[test]
    fn bitrate_within_tolerance_counts_as_compliant() {
        let rec = record(Codec::Mp3, Some(257), full_tags());
        assert_eq!(decide(&rec, &target()), ActionDecision::Skip);
    }

    #[test]
    fn bitrate_above_tolerance_converts() {
        let rec = record(Codec::Mp3, Some(258), full_tags());
        assert_eq!(
            decide(&rec, &target()),
            ActionDecision::Convert { bitrate_kbps: 256 }
        );
    }

    #[test]
    fn unknown_codec_rejected_before_anything_else() {
        let rec = record(Codec::Unknown, Some(128), full_tags());
        assert!(matches!(
            decide(&rec, &target()),
            ActionDecision::Reject { .. }
        ));
    }

    #[test]
    fn wrong_codec_with_full_tags_converts_only() {
        let rec = record(Codec::Flac, Some(900), full_tags());
        assert_eq!(
            decide(&rec, &target()),
            ActionDecision::Convert { bitrate_kbps: 256 }
        );
    }

    #[test]
    fn wrong_codec_with_missing_tags_converts_and_repairs() {
        let rec = record(Codec::Wav, Some(1411), TagSet::default());
        assert_eq!(
            decide(&rec, &target()),
            ActionDecision::ConvertAndRepair { bitrate_kbps: 256 }
        );
    }

    #[test]
    fn target_codec_without_probed_bitrate_converts() {
        let rec = record(Codec::Mp3, None, full_tags());
        assert_eq!(
            decide(&rec, &target()),
            ActionDecision::Convert { bitrate_kbps: 256 }
        );
    }
}
