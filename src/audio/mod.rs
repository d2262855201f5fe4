pub mod tone;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;

use anyhow::{anyhow, Context};
use log::{info, warn};
use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, DeviceTrait, OutputStream, OutputStreamHandle, Sink};

use crate::utils;
use tone::AlertTone;

pub const ALERT_FILE: &str = "dota2.mp3";

/// Plays the "match found" alert. Best effort: never blocks the caller and
/// never reports failure back.
pub trait AudioPlayer: Send + Sync {
    fn play_alert(&self, device_id: Option<usize>, volume: f32);
}

enum AudioCommand {
    Alert {
        device_id: Option<usize>,
        volume: f32,
        done: Option<Sender<()>>,
    },
}

/// Owns a dedicated audio thread; rodio's output stream is not `Send`, so it
/// lives and dies there.
pub struct AlertPlayer {
    sound_path: PathBuf,
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl AlertPlayer {
    pub fn new(assets_dir: &Path) -> Self {
        Self {
            sound_path: assets_dir.join(ALERT_FILE),
            tx: Mutex::new(None),
        }
    }

    pub fn sound_path(&self) -> &Path {
        &self.sound_path
    }

    /// Plays the alert and waits for it to finish. Used by diagnostics.
    pub fn play_and_wait(&self, device_id: Option<usize>, volume: f32) -> anyhow::Result<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.send(AudioCommand::Alert {
            device_id,
            volume,
            done: Some(done_tx),
        })?;
        done_rx
            .recv()
            .map_err(|_| anyhow!("audio thread exited before the alert finished"))
    }

    fn send(&self, command: AudioCommand) -> anyhow::Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(command)
            .map_err(|_| anyhow!("audio thread is not running"))
    }

    fn ensure_thread(&self) -> anyhow::Result<Sender<AudioCommand>> {
        let mut guard = utils::lock(&self.tx);
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let sound_path = self.sound_path.clone();

        thread::Builder::new()
            .name("audio-alert".to_string())
            .spawn(move || {
                // kept alive until the next alert replaces them
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(command) = rx.recv() {
                    match command {
                        AudioCommand::Alert {
                            device_id,
                            volume,
                            done,
                        } => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;

                            match start_alert(&sound_path, device_id, volume) {
                                Ok((stream, new_sink)) => {
                                    if let Some(done) = done {
                                        new_sink.sleep_until_end();
                                        let _ = done.send(());
                                    }
                                    _stream = Some(stream);
                                    sink = Some(new_sink);
                                }
                                Err(err) => {
                                    warn!("alert playback failed: {err:#}");
                                    if let Some(done) = done {
                                        let _ = done.send(());
                                    }
                                }
                            }
                        }
                    }
                }
            })
            .context("failed to spawn audio thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl AudioPlayer for AlertPlayer {
    fn play_alert(&self, device_id: Option<usize>, volume: f32) {
        let command = AudioCommand::Alert {
            device_id,
            volume,
            done: None,
        };
        if let Err(err) = self.send(command) {
            warn!("could not queue alert: {err:#}");
        }
    }
}

/// Names of the host's output devices; the position is the device id.
pub fn output_devices() -> Vec<String> {
    let host = rodio::cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices
            .map(|device| device.name().unwrap_or_else(|_| "<unnamed>".to_string()))
            .collect(),
        Err(err) => {
            warn!("failed to enumerate output devices: {err}");
            Vec::new()
        }
    }
}

fn start_alert(
    sound_path: &Path,
    device_id: Option<usize>,
    volume: f32,
) -> anyhow::Result<(OutputStream, Sink)> {
    let (stream, handle) = open_output(device_id)?;
    let sink = Sink::try_new(&handle).context("failed to create audio sink")?;
    sink.set_volume(volume.clamp(0.0, 1.0));

    match decode(sound_path) {
        Ok(source) => sink.append(source),
        Err(err) => {
            warn!("{err:#}; playing fallback tone");
            sink.append(AlertTone::new());
        }
    }

    Ok((stream, sink))
}

fn decode(path: &Path) -> anyhow::Result<Decoder<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Decoder::new(BufReader::new(file)).with_context(|| format!("cannot decode {}", path.display()))
}

fn open_output(device_id: Option<usize>) -> anyhow::Result<(OutputStream, OutputStreamHandle)> {
    if let Some(index) = device_id {
        let host = rodio::cpal::default_host();
        match host.output_devices() {
            Ok(mut devices) => match devices.nth(index) {
                Some(device) => match OutputStream::try_from_device(&device) {
                    Ok(output) => {
                        info!("alert on device {index} ({})", device.name().unwrap_or_default());
                        return Ok(output);
                    }
                    Err(err) => warn!("output device {index} unusable: {err}"),
                },
                None => warn!("output device {index} not found; using default"),
            },
            Err(err) => warn!("failed to enumerate output devices: {err}"),
        }
    }

    OutputStream::try_default().context("no default audio output")
}
