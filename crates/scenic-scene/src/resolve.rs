//! Resolution context and collaborator seams for element sources.
//!
//! Point-cloud conversion and geometry writing are external collaborators:
//! the scene crate only needs the resulting servable path or URL, so both
//! sit behind traits with process/disk-backed default implementations.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{SceneError, SceneResult};

/// Converts raw point geometry into the streaming layout at `out_dir`.
pub trait PointCloudConverter: Send + Sync {
    fn convert(&self, input: &Path, out_dir: &Path) -> SceneResult<()>;
}

/// Writes in-memory points to disk, returning the servable path.
pub trait GeometryWriter: Send + Sync {
    fn write_points(&self, points: &[[f32; 3]], out_dir: &Path, element_id: u64)
        -> SceneResult<PathBuf>;
}

/// Runs an external converter binary (e.g. a Potree converter).
pub struct ExternalConverter {
    pub program: String,
}

impl Default for ExternalConverter {
    fn default() -> Self {
        Self {
            program: "PotreeConverter".to_string(),
        }
    }
}

impl PointCloudConverter for ExternalConverter {
    fn convert(&self, input: &Path, out_dir: &Path) -> SceneResult<()> {
        tracing::info!("converting {} -> {}", input.display(), out_dir.display());
        let status = Command::new(&self.program)
            .arg(input)
            .arg("-o")
            .arg(out_dir)
            .status()?;
        if !status.success() {
            return Err(SceneError::Converter(format!(
                "{} exited with {} for {}",
                self.program,
                status,
                input.display()
            )));
        }
        Ok(())
    }
}

/// Writes points as an ASCII PLY file named after the element id.
#[derive(Default)]
pub struct PlyWriter;

impl GeometryWriter for PlyWriter {
    fn write_points(
        &self,
        points: &[[f32; 3]],
        out_dir: &Path,
        element_id: u64,
    ) -> SceneResult<PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("element_{}.ply", element_id));
        let mut file = File::create(&path)?;
        writeln!(file, "ply")?;
        writeln!(file, "format ascii 1.0")?;
        writeln!(file, "element vertex {}", points.len())?;
        writeln!(file, "property float x")?;
        writeln!(file, "property float y")?;
        writeln!(file, "property float z")?;
        writeln!(file, "end_header")?;
        for p in points {
            writeln!(file, "{} {} {}", p[0], p[1], p[2])?;
        }
        Ok(path)
    }
}

/// Everything an element needs to turn raw input into a servable source.
pub struct ResolveContext {
    pub base_url: String,
    pub port: u16,
    /// Directory converter output and written geometry land in.
    pub output_dir: PathBuf,
    pub converter: Arc<dyn PointCloudConverter>,
    pub writer: Arc<dyn GeometryWriter>,
}

impl ResolveContext {
    pub fn new(base_url: impl Into<String>, port: u16, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            port,
            output_dir: output_dir.into(),
            converter: Arc::new(ExternalConverter::default()),
            writer: Arc::new(PlyWriter),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn PointCloudConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn GeometryWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Base the front end reaches this server under, e.g. `http://127.0.0.1:5000`.
    pub fn http_base(&self) -> String {
        format!("{}:{}", self.base_url, self.port)
    }

    /// SHA-256 of the file contents, used to key converter output so the
    /// same cloud is never converted twice.
    pub fn content_hash(&self, path: &Path) -> SceneResult<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        let dir = std::env::temp_dir().join("scenic_hash_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("points.txt");
        std::fs::write(&path, b"0 0 0\n1 1 1\n").unwrap();

        let ctx = ResolveContext::new("http://127.0.0.1", 5000, &dir);
        let a = ctx.content_hash(&path).unwrap();
        let b = ctx.content_hash(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_http_base() {
        let ctx = ResolveContext::new("http://127.0.0.1", 5050, "data");
        assert_eq!(ctx.http_base(), "http://127.0.0.1:5050");
    }
}
