//! Persisting artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::report::RunReport;
use crate::error::Result;
use crate::model::{ArtifactKind, OutputArtifact};

/// File naming for written artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `page-0.svg`, `page-0-thumb.jpg`
    #[default]
    ZeroBased,
    /// `001.svg`, `001.jpg`
    Numbered,
}

impl NamingScheme {
    pub fn file_name(self, artifact: &OutputArtifact) -> String {
        match self {
            NamingScheme::ZeroBased => artifact.suggested_filename(),
            NamingScheme::Numbered => format!(
                "{:03}.{}",
                artifact.page_index + 1,
                artifact.format.extension()
            ),
        }
    }
}

/// Destination for finished artifacts.
///
/// Called from pipeline workers, possibly several at once.
pub trait ArtifactWriter: Send + Sync {
    /// Persist one artifact, returning where it went.
    fn write(&self, artifact: &OutputArtifact) -> Result<PathBuf>;
}

/// Writes artifacts as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    dir: PathBuf,
    naming: NamingScheme,
    thumbnails_dir: Option<PathBuf>,
}

impl DirectoryWriter {
    /// Create the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            naming: NamingScheme::default(),
            thumbnails_dir: None,
        })
    }

    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    /// Put thumbnails in a subdirectory of the output directory.
    pub fn with_thumbnail_subdir(mut self, name: impl AsRef<Path>) -> Result<Self> {
        let sub = self.dir.join(name);
        fs::create_dir_all(&sub)?;
        self.thumbnails_dir = Some(sub);
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `artifact` will be written.
    pub fn path_for(&self, artifact: &OutputArtifact) -> PathBuf {
        let dir = match (artifact.kind, &self.thumbnails_dir) {
            (ArtifactKind::Thumbnail, Some(sub)) => sub,
            _ => &self.dir,
        };
        dir.join(self.naming.file_name(artifact))
    }

    /// Write the run report as pretty JSON.
    pub fn write_report(&self, report: &RunReport, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(report)?)?;
        Ok(path)
    }

    /// Persist an artifact without blocking the async runtime.
    #[cfg(feature = "async")]
    pub async fn write_async(&self, artifact: &OutputArtifact) -> Result<PathBuf> {
        let path = self.path_for(artifact);
        tokio::fs::write(&path, &artifact.bytes).await?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Persist every artifact of a finished run.
    #[cfg(feature = "async")]
    pub async fn write_all_async(&self, report: &RunReport) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for artifact in report.artifacts() {
            paths.push(self.write_async(artifact).await?);
        }
        Ok(paths)
    }
}

impl ArtifactWriter for DirectoryWriter {
    fn write(&self, artifact: &OutputArtifact) -> Result<PathBuf> {
        let path = self.path_for(artifact);
        fs::write(&path, &artifact.bytes)?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactFormat;

    fn artifact(kind: ArtifactKind, format: ArtifactFormat) -> OutputArtifact {
        OutputArtifact {
            page_index: 0,
            kind,
            format,
            bytes: b"data".to_vec(),
            width: 1.0,
            height: 1.0,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_naming_schemes() {
        let svg = artifact(ArtifactKind::Vector, ArtifactFormat::Svg);
        let jpg = artifact(ArtifactKind::Thumbnail, ArtifactFormat::Jpeg);
        assert_eq!(NamingScheme::ZeroBased.file_name(&svg), "page-0.svg");
        assert_eq!(NamingScheme::ZeroBased.file_name(&jpg), "page-0-thumb.jpg");
        assert_eq!(NamingScheme::Numbered.file_name(&svg), "001.svg");
        assert_eq!(NamingScheme::Numbered.file_name(&jpg), "001.jpg");
    }

    #[test]
    fn test_directory_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = DirectoryWriter::new(tmp.path().join("out"))
            .unwrap()
            .with_thumbnail_subdir("thumbs")
            .unwrap();

        let vector = writer
            .write(&artifact(ArtifactKind::Vector, ArtifactFormat::Svg))
            .unwrap();
        let thumb = writer
            .write(&artifact(ArtifactKind::Thumbnail, ArtifactFormat::Jpeg))
            .unwrap();

        assert_eq!(vector, tmp.path().join("out").join("page-0.svg"));
        assert_eq!(
            thumb,
            tmp.path().join("out").join("thumbs").join("page-0-thumb.jpg")
        );
        assert_eq!(fs::read(&thumb).unwrap(), b"data");
    }
}
