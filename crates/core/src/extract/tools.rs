use super::ExtractionError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Runs a command and returns its stdout, mapping a missing binary to `ToolNotFound`.
pub(super) fn run_capture(mut cmd: Command, tool: &str) -> Result<String, ExtractionError> {
    let output = cmd.output();
    handle_output(output, tool)
}

fn handle_output(result: std::io::Result<Output>, tool: &str) -> Result<String, ExtractionError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExtractionError::ExtractionFailed(format!(
                "{tool} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

pub(super) fn pdftotext(pdf: &Path) -> Result<String, ExtractionError> {
    let mut cmd = Command::new("pdftotext");
    cmd.arg("-layout").arg("-enc").arg("UTF-8").arg(pdf).arg("-");
    run_capture(cmd, "pdftotext")
}

/// Renders every page of `pdf` to PNG under `out_dir`, returning the images in page order.
pub(super) fn pdftoppm(pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut cmd = Command::new("pdftoppm");
    cmd.args(["-png", "-r", "300"])
        .arg(pdf)
        .arg(out_dir.join("page"));
    run_capture(cmd, "pdftoppm")?;

    let mut images: Vec<PathBuf> = std::fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    // pdftoppm zero-pads page numbers to a common width, so name order is page order.
    images.sort();
    Ok(images)
}

pub(super) fn tesseract(image: &Path, language: &str) -> Result<String, ExtractionError> {
    let mut cmd = Command::new("tesseract");
    cmd.arg(image).arg("stdout").args(["-l", language]);
    run_capture(cmd, "tesseract")
}
