//! Real-time audio thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use stave_audio::{AudioError, AudioOutput, CpalOutput};
use stave_engine::Frame;
use tracing::{debug, error, info};

use crate::deck::{Deck, SharedDeck};
use crate::ControllerError;

/// Samples rendered per lock of the deck.
const BLOCK: usize = 256;

/// A running audio thread.
pub(crate) struct AudioHandle {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl AudioHandle {
    /// Open the default device and start rendering `deck` into it.
    ///
    /// Returns once the device is running, with the player switched to the
    /// device rate.
    pub(crate) fn spawn(deck: SharedDeck, preferred_rate: u32, buffer_ms: u32) -> Result<Self, ControllerError> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let stop = stop_signal.clone();
        let thread = std::thread::Builder::new()
            .name("stave-audio".into())
            .spawn(move || {
                let output = match open_output(preferred_rate, buffer_ms) {
                    Ok(output) => output,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                deck.lock().player.set_sample_rate(output.sample_rate());
                let _ = ready_tx.send(Ok(output.sample_rate()));
                audio_thread(output, deck, stop);
            })?;

        let sample_rate = ready_rx.recv().map_err(|_| ControllerError::AudioThread)??;
        info!(sample_rate, "audio running");

        Ok(Self {
            stop_signal,
            thread: Some(thread),
            sample_rate,
        })
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("audio thread panicked");
            }
        }
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_output(preferred_rate: u32, buffer_ms: u32) -> Result<CpalOutput, AudioError> {
    let (mut output, consumer) = CpalOutput::new(Some(preferred_rate), buffer_ms)?;
    output.build_stream(consumer)?;
    output.start()?;
    Ok(output)
}

fn audio_thread(mut output: CpalOutput, deck: SharedDeck, stop_signal: Arc<AtomicBool>) {
    let mut block = [0i16; BLOCK];

    while !stop_signal.load(Ordering::Relaxed) {
        render_block(&mut deck.lock(), &mut block);
        for &sample in &block {
            output.write_blocking(Frame::mono(sample));
        }
    }

    if let Err(err) = output.stop() {
        debug!(%err, "stopping output");
    }
}

#[cfg(feature = "alloc_check")]
fn render_block(deck: &mut Deck, block: &mut [i16]) {
    assert_no_alloc::assert_no_alloc(|| deck.render(block));
}

#[cfg(not(feature = "alloc_check"))]
fn render_block(deck: &mut Deck, block: &mut [i16]) {
    deck.render(block);
}
