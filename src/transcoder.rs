use crate::config::EncodeTarget;
use crate::probe::Codec;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("no encoder available for {codec}")]
    UnsupportedTarget { codec: Codec },
}

/// The external codec engine. Treated as an opaque, possibly slow,
/// possibly failing collaborator; swapped for a fake in tests.
pub trait CodecEngine: Send + Sync {
    fn encode(&self, source: &Path, dest: &Path, target: &EncodeTarget) -> Result<(), EngineError>;
}

pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_args(source: &Path, dest: &Path, target: &EncodeTarget) -> Option<Vec<OsString>> {
        let encoder = target.codec.ffmpeg_encoder()?;
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            source.as_os_str().to_os_string(),
            "-vn".into(),
            "-c:a".into(),
            encoder.into(),
        ];
        if !target.codec.is_lossless() {
            args.push("-b:a".into());
            args.push(format!("{}k", target.bitrate_kbps).into());
        }
        args.push("-map_metadata".into());
        args.push("0".into());
        args.push(dest.as_os_str().to_os_string());
        Some(args)
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl CodecEngine for FfmpegEngine {
    fn encode(&self, source: &Path, dest: &Path, target: &EncodeTarget) -> Result<(), EngineError> {
        let command = self.binary.display().to_string();
        let args = Self::build_args(source, dest, target).ok_or(EngineError::UnsupportedTarget {
            codec: target.codec,
        })?;

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| EngineError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to stage output next to {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine output for {path} is empty or unreadable")]
    BadOutput { path: PathBuf },
    #[error("failed to replace {path}: {reason}")]
    Replace { path: PathBuf, reason: String },
}

#[derive(Debug)]
pub struct Conversion {
    pub output: PathBuf,
    pub bytes_saved: i64,
}

pub struct Transcoder {
    engine: Box<dyn CodecEngine>,
    target: EncodeTarget,
}

impl Transcoder {
    pub fn new(engine: Box<dyn CodecEngine>, target: EncodeTarget) -> Self {
        Self { engine, target }
    }

    /// Re-encodes `source` into the target format. The encoded stream is
    /// staged in the source's directory and the source is only replaced
    /// once the staged file verifies as non-empty and openable; on any
    /// failure the source is left exactly as it was.
    pub fn transcode(&self, source: &Path) -> Result<Conversion, TranscodeError> {
        let stage_err = |source_err: std::io::Error| TranscodeError::Stage {
            path: source.to_path_buf(),
            source: source_err,
        };
        let parent = source.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
            stage_err(std::io::Error::other("source has no parent directory"))
        })?;

        let extension = self.target.codec.extension();
        let staged = tempfile::Builder::new()
            .prefix(".audiopress-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(parent)
            .map_err(stage_err)?
            .into_temp_path();

        self.engine.encode(source, &staged, &self.target)?;
        verify_output(&staged)?;

        let source_meta = fs::metadata(source).map_err(|err| TranscodeError::Replace {
            path: source.to_path_buf(),
            reason: err.to_string(),
        })?;
        let staged_len = fs::metadata(&staged)
            .map(|m| m.len())
            .unwrap_or_default();

        if let Err(err) = fs::set_permissions(&staged, source_meta.permissions()) {
            tracing::warn!(path = %source.display(), error = %err, "could not carry over permissions");
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if let Err(err) = std::os::unix::fs::chown(
                &staged,
                Some(source_meta.uid()),
                Some(source_meta.gid()),
            ) {
                tracing::debug!(path = %source.display(), error = %err, "could not carry over ownership");
            }
        }

        let output = source.with_extension(extension);
        staged
            .persist(&output)
            .map_err(|err| TranscodeError::Replace {
                path: output.clone(),
                reason: err.to_string(),
            })?;

        if output != source {
            fs::remove_file(source).map_err(|err| TranscodeError::Replace {
                path: source.to_path_buf(),
                reason: format!("converted file written but source not removed: {err}"),
            })?;
        }

        Ok(Conversion {
            output,
            bytes_saved: source_meta.len() as i64 - staged_len as i64,
        })
    }
}

fn verify_output(staged: &Path) -> Result<(), TranscodeError> {
    let bad = || TranscodeError::BadOutput {
        path: staged.to_path_buf(),
    };
    let meta = fs::metadata(staged).map_err(|_| bad())?;
    if meta.len() == 0 {
        return Err(bad());
    }
    fs::File::open(staged).map_err(|_| bad())?;
    Ok(())
}
