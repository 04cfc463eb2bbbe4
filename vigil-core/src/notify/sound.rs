//! Platform sound playback: custom `.wav` assets with a system-beep
//! fallback when the file is missing or the format is unsupported.

use std::path::Path;

use tracing::{debug, warn};

pub(crate) fn play(path: &Path) {
    if path.as_os_str().is_empty() {
        beep();
        return;
    }
    let is_wav = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !path.exists() || !is_wav {
        warn!(path = %path.display(), "alert sound missing or not a wav; using system beep");
        beep();
        return;
    }
    play_wav(path);
}

#[cfg(windows)]
fn play_wav(path: &Path) {
    if !crate::probe::windows::play_wav(path) {
        warn!(path = %path.display(), "wav playback failed");
    } else {
        debug!(path = %path.display(), "alert sound playing");
    }
}

#[cfg(windows)]
fn beep() {
    crate::probe::windows::beep();
}

#[cfg(not(windows))]
fn play_wav(path: &Path) {
    debug!(path = %path.display(), "no audio backend on this platform");
}

#[cfg(not(windows))]
fn beep() {
    debug!("no audio backend on this platform");
}
