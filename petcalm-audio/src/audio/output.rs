//! Audio output host abstraction
//!
//! A producer (signal generator or streamed asset) owns exactly one
//! `RenderContext`: an exclusive processing graph that pulls frames from a
//! render closure on the platform audio thread. Suspending a context stops
//! the pulls entirely; closing it releases the graph for good.
//!
//! Implementations:
//! - `CpalHost` (feature `device-output`): real device output via cpal
//! - `OfflineHost`: renders on demand, records context lifecycle

use super::types::AudioFrame;
use crate::error::Result;
use uuid::Uuid;

/// Render callback run on the audio thread; fills every frame of the slice
pub type RenderFn = Box<dyn FnMut(&mut [AudioFrame]) + Send + 'static>;

/// Exclusive processing context owned by one producer
pub trait RenderContext: Send {
    fn id(&self) -> Uuid;

    fn label(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Begin pulling frames from `render`
    fn start(&mut self, render: RenderFn) -> Result<()>;

    /// Stop processing without releasing the graph
    fn suspend(&mut self) -> Result<()>;

    /// Continue processing after `suspend`
    fn resume(&mut self) -> Result<()>;

    /// Release the graph; safe to call repeatedly
    fn close(&mut self);

    fn is_running(&self) -> bool;
}

/// Platform audio graph factory
pub trait AudioHost: Send + Sync {
    /// Rate every context of this host renders at
    fn sample_rate(&self) -> u32;

    /// Whether procedural synthesis is available on this platform
    fn supports_generation(&self) -> bool;

    /// Open a new exclusive context; `label` identifies it in logs
    fn open(&self, label: &str) -> Result<Box<dyn RenderContext>>;
}

#[cfg(feature = "device-output")]
pub use device::CpalHost;

#[cfg(feature = "device-output")]
mod device {
    use super::{AudioFrame, AudioHost, RenderContext, RenderFn};
    use crate::error::{Error, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread::JoinHandle;
    use tracing::{debug, error, info, warn};
    use uuid::Uuid;

    /// Device host backed by the default cpal output device.
    ///
    /// `cpal::Stream` is not `Send`, so each context keeps its stream on a
    /// dedicated thread and is driven through a control channel.
    pub struct CpalHost {
        config: StreamConfig,
        sample_format: SampleFormat,
    }

    impl CpalHost {
        /// Open the default output device, preferring `preferred_rate`
        pub fn new(preferred_rate: u32) -> Result<Self> {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No output device available".to_string()))?;

            let (config, sample_format) = best_config(&device, preferred_rate)?;

            info!(
                "Audio device: {} ({}Hz, {} channels, {:?})",
                device.name().unwrap_or_else(|_| "unknown".to_string()),
                config.sample_rate.0,
                config.channels,
                sample_format
            );

            Ok(Self {
                config,
                sample_format,
            })
        }
    }

    /// Prefer stereo f32 at the requested rate, else the device default
    fn best_config(device: &cpal::Device, preferred_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= preferred_rate
                && config.max_sample_rate().0 >= preferred_rate
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(preferred_rate))
                .config();
            return Ok((config, sample_format));
        }

        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }

    impl AudioHost for CpalHost {
        fn sample_rate(&self) -> u32 {
            self.config.sample_rate.0
        }

        fn supports_generation(&self) -> bool {
            true
        }

        fn open(&self, label: &str) -> Result<Box<dyn RenderContext>> {
            Ok(Box::new(CpalContext {
                id: Uuid::new_v4(),
                label: label.to_string(),
                config: self.config.clone(),
                sample_format: self.sample_format,
                alive: Arc::new(AtomicBool::new(false)),
                control: None,
                thread: None,
                running: false,
            }))
        }
    }

    enum StreamControl {
        Suspend,
        Resume,
        Close,
    }

    struct CpalContext {
        id: Uuid,
        label: String,
        config: StreamConfig,
        sample_format: SampleFormat,
        /// Gate checked by the callback; false renders silence
        alive: Arc<AtomicBool>,
        control: Option<mpsc::Sender<StreamControl>>,
        thread: Option<JoinHandle<()>>,
        running: bool,
    }

    impl CpalContext {
        fn send(&self, msg: StreamControl) -> Result<()> {
            match &self.control {
                Some(tx) => tx
                    .send(msg)
                    .map_err(|_| Error::AudioOutput(format!("{}: stream thread gone", self.label))),
                None => Err(Error::AudioOutput(format!("{}: context not started", self.label))),
            }
        }
    }

    impl RenderContext for CpalContext {
        fn id(&self) -> Uuid {
            self.id
        }

        fn label(&self) -> &str {
            &self.label
        }

        fn sample_rate(&self) -> u32 {
            self.config.sample_rate.0
        }

        fn start(&mut self, render: RenderFn) -> Result<()> {
            if self.control.is_some() {
                return Err(Error::AudioOutput(format!("{}: already started", self.label)));
            }

            let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
            let (control_tx, control_rx) = mpsc::channel::<StreamControl>();
            let config = self.config.clone();
            let sample_format = self.sample_format;
            let alive = Arc::clone(&self.alive);
            let label = self.label.clone();

            alive.store(true, Ordering::Release);

            let thread = std::thread::Builder::new()
                .name(format!("petcalm-out-{}", label))
                .spawn(move || {
                    let stream = match sample_format {
                        SampleFormat::F32 => build_stream::<f32>(&config, render, alive),
                        SampleFormat::I16 => build_stream::<i16>(&config, render, alive),
                        SampleFormat::U16 => build_stream::<u16>(&config, render, alive),
                        other => Err(Error::AudioOutput(format!(
                            "Unsupported sample format: {:?}",
                            other
                        ))),
                    };

                    let stream = match stream.and_then(|s| {
                        s.play()
                            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
                        Ok(s)
                    }) {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    for msg in control_rx {
                        let outcome = match msg {
                            StreamControl::Suspend => stream.pause(),
                            StreamControl::Resume => stream.play(),
                            StreamControl::Close => break,
                        };
                        if let Err(e) = outcome {
                            warn!("{}: stream control failed: {}", label, e);
                        }
                    }

                    debug!("{}: stream thread exiting", label);
                })
                .map_err(|e| Error::AudioOutput(format!("Failed to spawn stream thread: {}", e)))?;

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    self.control = Some(control_tx);
                    self.thread = Some(thread);
                    self.running = true;
                    Ok(())
                }
                Ok(Err(e)) => {
                    self.alive.store(false, Ordering::Release);
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    self.alive.store(false, Ordering::Release);
                    Err(Error::AudioOutput(format!("{}: stream thread died", self.label)))
                }
            }
        }

        fn suspend(&mut self) -> Result<()> {
            if self.running {
                self.send(StreamControl::Suspend)?;
                self.running = false;
            }
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            if !self.running && self.control.is_some() {
                self.send(StreamControl::Resume)?;
                self.running = true;
            }
            Ok(())
        }

        fn close(&mut self) {
            self.alive.store(false, Ordering::Release);
            if let Some(tx) = self.control.take() {
                let _ = tx.send(StreamControl::Close);
            }
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    error!("{}: stream thread panicked", self.label);
                }
            }
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    impl Drop for CpalContext {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn build_stream<T>(
        config: &StreamConfig,
        mut render: RenderFn,
        alive: Arc<AtomicBool>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device available".to_string()))?;
        let channels = config.channels as usize;
        let mut frames: Vec<AudioFrame> = Vec::new();
        let mut scratch = vec![0.0f32; channels.max(1)];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frame_count = data.len() / channels.max(1);
                    if frames.len() < frame_count {
                        frames.resize(frame_count, AudioFrame::zero());
                    }
                    let block = &mut frames[..frame_count];

                    if alive.load(Ordering::Acquire) {
                        render(block);
                    } else {
                        block.fill(AudioFrame::zero());
                    }

                    for (out, frame) in data.chunks_mut(channels.max(1)).zip(block.iter()) {
                        let mut frame = *frame;
                        frame.clamp();
                        frame.write_to(&mut scratch);
                        for (dst, &src) in out.iter_mut().zip(scratch.iter()) {
                            *dst = T::from_sample(src);
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}
