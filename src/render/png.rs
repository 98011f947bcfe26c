use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ConversionError, PdfRasterizer};

const STDERR_LIMIT: usize = 512;

/// Rasterizes the first PDF page with poppler's `pdftoppm`, piping the PDF in
/// on stdin and reading the PNG from stdout.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    program: PathBuf,
    resolution_dpi: u32,
}

impl Pdftoppm {
    pub const DEFAULT_RESOLUTION_DPI: u32 = 100;

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            resolution_dpi: Self::DEFAULT_RESOLUTION_DPI,
        }
    }

    pub fn with_resolution(mut self, resolution_dpi: u32) -> Self {
        self.resolution_dpi = resolution_dpi;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-png")
            .arg("-singlefile")
            .arg("-f")
            .arg("1")
            .arg("-r")
            .arg(self.resolution_dpi.to_string())
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PdfRasterizer for Pdftoppm {
    async fn to_png(&self, pdf: &[u8]) -> Result<Bytes, ConversionError> {
        let mut child = self.command().spawn().map_err(|source| ConversionError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            ConversionError::Io(std::io::Error::other("rasterizer stdin unavailable"))
        })?;
        let input = pdf.to_vec();

        // Feed stdin while collecting output so a large page cannot fill the pipes.
        let feed = async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            written
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(STDERR_LIMIT)
                .collect();
            return Err(ConversionError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }
        fed?;

        if output.stdout.is_empty() {
            return Err(ConversionError::EmptyOutput);
        }
        Ok(Bytes::from(output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_reaches_the_command_line() {
        let rasterizer = Pdftoppm::new("pdftoppm").with_resolution(150);
        let command = rasterizer.command();
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        let flag = args.iter().position(|arg| arg == "-r").expect("-r flag");
        assert_eq!(args[flag + 1], "150");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let rasterizer = Pdftoppm::new("/nonexistent/ballot-studio/pdftoppm");
        let err = rasterizer.to_png(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_reports_exit_status() {
        let rasterizer = Pdftoppm::new("false");
        let err = rasterizer.to_png(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, ConversionError::Failed { .. }));
    }
}
