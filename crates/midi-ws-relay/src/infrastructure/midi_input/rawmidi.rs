//! Raw MIDI character device backend.
//!
//! Linux exposes every ALSA MIDI port as a character device
//! (`/dev/snd/midiC<card>D<device>`); older OSS setups and several BSDs use
//! `/dev/midi`.  Reading one yields the MIDI wire bytes unchanged, which
//! [`MidiStreamParser`] turns into events.
//!
//! The reader runs on its own thread and polls the device with a short
//! timeout, so it never sits in `read()` on an idle port.  `stop()` clears
//! the running flag and joins the thread; the descriptor is closed when it
//! returns.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex,
};
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, error, info, warn};

use midi_relay_core::{MidiStreamParser, RawMidiEvent, StreamClock};

use super::{MidiSource, SourceError};

/// Directory scanned for ALSA raw MIDI devices.
const ALSA_DEVICE_DIR: &str = "/dev/snd";

/// Fallback device when no ALSA raw MIDI device exists.
const OSS_DEVICE: &str = "/dev/midi";

/// Bytes requested per `read()` call.
const READ_CHUNK: usize = 256;

/// Upper bound on how long `stop()` waits for the reader to notice.
const POLL_INTERVAL_MS: u16 = 100;

/// Reads MIDI events from a raw MIDI character device.
pub struct RawMidiSource {
    path: PathBuf,
    buffer_capacity: usize,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RawMidiSource {
    /// Creates a source for the device at `path`.  Nothing is opened until
    /// [`MidiSource::start`].
    pub fn new(path: impl Into<PathBuf>, buffer_capacity: usize) -> Self {
        Self {
            path: path.into(),
            buffer_capacity: buffer_capacity.max(1),
            running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }
    }

    /// Selects the default input: the first ALSA raw MIDI device, else
    /// `/dev/midi`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoDevice`] if neither exists.
    pub fn discover(buffer_capacity: usize) -> Result<Self, SourceError> {
        let path = find_default_device(Path::new(ALSA_DEVICE_DIR), Path::new(OSS_DEVICE))
            .ok_or_else(|| {
                SourceError::NoDevice(format!(
                    "looked for {ALSA_DEVICE_DIR}/midiC*D* and {OSS_DEVICE}"
                ))
            })?;
        info!("using MIDI input device {}", path.display());
        Ok(Self::new(path, buffer_capacity))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Returns the lexically first `midiC*D*` entry in `alsa_dir`, else
/// `fallback` if it exists.
fn find_default_device(alsa_dir: &Path, fallback: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(alsa_dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_rawmidi_name)
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .or_else(|| fallback.exists().then(|| fallback.to_path_buf()))
}

/// Matches `midiC<digits>D<digits>`.
fn is_rawmidi_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("midiC") else {
        return false;
    };
    let Some((card, device)) = rest.split_once('D') else {
        return false;
    };
    !card.is_empty()
        && !device.is_empty()
        && card.bytes().all(|b| b.is_ascii_digit())
        && device.bytes().all(|b| b.is_ascii_digit())
}

impl MidiSource for RawMidiSource {
    fn start(&self) -> Result<mpsc::Receiver<RawMidiEvent>, SourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SourceError::AlreadyStarted);
        }

        let file = File::open(&self.path).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            SourceError::Open {
                device: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let (tx, rx) = mpsc::sync_channel(self.buffer_capacity);
        let running = Arc::clone(&self.running);
        let device = self.path.display().to_string();

        let handle = thread::Builder::new()
            .name("midi-rawmidi-reader".to_string())
            .spawn(move || read_device(file, &device, tx, &running))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SourceError::Open {
                    device: self.path.display().to_string(),
                    reason: format!("failed to spawn reader thread: {e}"),
                }
            })?;

        if let Ok(mut reader) = self.reader.lock() {
            *reader = Some(handle);
        }
        Ok(rx)
    }

    /// Stops the reader and waits for it to release the device.  Blocks for
    /// at most one poll interval.
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.reader.lock().ok().and_then(|mut reader| reader.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("reader thread for {} panicked", self.path.display());
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reader thread body: bytes → parser → channel.
fn read_device(
    mut file: File,
    device: &str,
    tx: mpsc::SyncSender<RawMidiEvent>,
    running: &AtomicBool,
) {
    let clock = StreamClock::start();
    let mut parser = MidiStreamParser::new();
    let mut buf = [0u8; READ_CHUNK];

    while running.load(Ordering::SeqCst) {
        match wait_readable(&file) {
            Ok(true) => {}
            Ok(false) | Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("MIDI input {device} poll failed: {e}");
                break;
            }
        }

        let n = match file.read(&mut buf) {
            Ok(0) => {
                info!("MIDI input {device} reached end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("MIDI input {device} read failed: {e}");
                break;
            }
        };

        for event in parser.feed(&buf[..n], clock.elapsed_ms()) {
            if tx.send(event).is_err() {
                debug!("MIDI event receiver dropped; stopping reader for {device}");
                return;
            }
        }
    }
    debug!("reader for {device} exited");
}

/// Waits up to one poll interval for `file` to become readable or hang up.
fn wait_readable(file: &File) -> Result<bool, Errno> {
    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
    let ready = poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS))?;
    Ok(ready > 0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
