use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const HANDPOSE_MODEL_FILENAME: &str = "handpose_estimation_mediapipe_2023feb.onnx";
const HANDPOSE_MODEL_URL: &str = "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/handpose_estimation_mediapipe_2023feb.onnx";

pub fn handpose_model_path(model_dir: &Path) -> PathBuf {
    model_dir.join(HANDPOSE_MODEL_FILENAME)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelDownloadEvent {
    AlreadyPresent,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

/// Reuses the model at `model_path` or downloads it there, reporting progress
/// both to `on_event` and to a terminal progress bar.
pub fn ensure_handpose_model_ready<F>(model_path: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if model_path.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent);
        on_event(ModelDownloadEvent::Finished);
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    log::info!(
        "downloading handpose model from {HANDPOSE_MODEL_URL} to {}",
        model_path.display()
    );

    let mut progress: Option<ProgressBar> = None;
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(HANDPOSE_MODEL_URL)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    write_with_progress(response, model_path, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message("handpose model ready");
                }
            }
            ModelDownloadEvent::AlreadyPresent => {}
        }
        on_event(event);
    })
}

/// Streams `reader` into a temporary sibling of `dest` and moves it into place
/// once complete, so an interrupted download never leaves a truncated model.
fn write_with_progress<R, F>(mut reader: R, dest: &Path, on_event: &mut F) -> anyhow::Result<()>
where
    R: Read + ContentLength,
    F: FnMut(ModelDownloadEvent),
{
    let total = reader.content_length();
    on_event(ModelDownloadEvent::Started { total });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        on_event(ModelDownloadEvent::Progress { downloaded, total });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(ModelDownloadEvent::Finished);
    Ok(())
}

trait ContentLength {
    fn content_length(&self) -> Option<u64>;
}

impl ContentLength for reqwest::blocking::Response {
    fn content_length(&self) -> Option<u64> {
        reqwest::blocking::Response::content_length(self)
    }
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
