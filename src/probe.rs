use crate::tags::TagSet;
use lofty::error::ErrorKind;
use lofty::{AudioFile, FileType, Probe, TaggedFileExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Mp3,
    Flac,
    Vorbis,
    Opus,
    Aac,
    Alac,
    Wav,
    Aiff,
    Ape,
    WavPack,
    Unknown,
}

impl Codec {
    pub fn from_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Mpeg => Codec::Mp3,
            FileType::Flac => Codec::Flac,
            FileType::Vorbis => Codec::Vorbis,
            FileType::Opus => Codec::Opus,
            // m4a containers are treated as AAC.
            FileType::Aac | FileType::Mp4 => Codec::Aac,
            FileType::Wav => Codec::Wav,
            FileType::Aiff => Codec::Aiff,
            FileType::Ape => Codec::Ape,
            FileType::WavPack => Codec::WavPack,
            _ => Codec::Unknown,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Codec::Mp3 => "mp3",
            Codec::Flac => "flac",
            Codec::Vorbis => "ogg",
            Codec::Opus => "opus",
            Codec::Aac | Codec::Alac => "m4a",
            Codec::Wav => "wav",
            Codec::Aiff => "aiff",
            Codec::Ape => "ape",
            Codec::WavPack => "wv",
            Codec::Unknown => "bin",
        }
    }

    pub fn ffmpeg_encoder(self) -> Option<&'static str> {
        match self {
            Codec::Mp3 => Some("libmp3lame"),
            Codec::Flac => Some("flac"),
            Codec::Vorbis => Some("libvorbis"),
            Codec::Opus => Some("libopus"),
            Codec::Aac => Some("aac"),
            Codec::Alac => Some("alac"),
            Codec::Wav => Some("pcm_s16le"),
            Codec::Aiff => Some("pcm_s16be"),
            Codec::WavPack => Some("wavpack"),
            Codec::Ape | Codec::Unknown => None,
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(
            self,
            Codec::Flac | Codec::Alac | Codec::Wav | Codec::Aiff | Codec::Ape | Codec::WavPack
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Codec::Mp3 => "mp3",
            Codec::Flac => "flac",
            Codec::Vorbis => "vorbis",
            Codec::Opus => "opus",
            Codec::Aac => "aac",
            Codec::Alac => "alac",
            Codec::Wav => "wav",
            Codec::Aiff => "aiff",
            Codec::Ape => "ape",
            Codec::WavPack => "wavpack",
            Codec::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of one candidate file, taken once per run. Immutable after
/// creation; the processing step for the file owns it for the file's
/// lifetime in the batch.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub codec: Codec,
    pub bitrate_kbps: Option<u32>,
    pub tags: TagSet,
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
#[error("unreadable file {path}: {reason}")]
pub struct UnreadableFile {
    pub path: PathBuf,
    pub reason: String,
}

impl UnreadableFile {
    fn new(path: &Path, reason: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub struct AudioProbe;

impl AudioProbe {
    /// Inspect a file without mutating it. A container lofty does not
    /// recognize yields a record with `Codec::Unknown` so the decision
    /// policy can reject it; only files that cannot be opened or whose
    /// recognized format fails to parse are an error.
    pub fn probe(&self, path: &Path) -> Result<FileRecord, UnreadableFile> {
        let size_bytes = fs::metadata(path)
            .map_err(|err| UnreadableFile::new(path, err))?
            .len();

        let probe = Probe::open(path).map_err(|err| UnreadableFile::new(path, err))?;
        let tagged = match probe.read() {
            Ok(tagged) => tagged,
            Err(err) if matches!(err.kind(), ErrorKind::UnknownFormat) => {
                return Ok(FileRecord {
                    path: path.to_path_buf(),
                    codec: Codec::Unknown,
                    bitrate_kbps: None,
                    tags: TagSet::default(),
                    size_bytes,
                });
            }
            Err(err) => return Err(UnreadableFile::new(path, err)),
        };

        let properties = tagged.properties();
        let bitrate_kbps = properties.audio_bitrate().or(properties.overall_bitrate());
        let tags = tagged
            .primary_tag()
            .or_else(|| tagged.tags().first())
            .map(TagSet::from_lofty)
            .unwrap_or_default();

        Ok(FileRecord {
            path: path.to_path_buf(),
            codec: Codec::from_file_type(tagged.file_type()),
            bitrate_kbps,
            tags,
            size_bytes,
        })
    }
}
