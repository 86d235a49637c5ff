//! Background image decoding.
//!
//! The engine is single-threaded and event-driven; decoding is the one job
//! that leaves the control thread.  Each request spawns a worker that decodes
//! its own copy of the bytes and sends the finished buffer back over a
//! channel.  The shell pumps [`DecodePool::poll`] once per frame; nothing
//! ever blocks waiting for a decode except an explicit [`DecodePool::flush`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use image::RgbaImage;

use crate::canvas::EditorState;
use crate::components::history::HistoryManager;
use crate::error::EditorError;
use crate::io;
use crate::ops::layers;

enum DecodeTarget {
    /// Fill an existing layer's buffer in place (history reconstruction).
    /// Completion is not a history event.
    Fill { layer_id: u64 },
    /// Create a new image layer from the decoded buffer (import); the layer
    /// creation is recorded as an add.
    Import,
}

struct DecodeResult {
    target: DecodeTarget,
    outcome: Result<RgbaImage, EditorError>,
}

pub struct DecodePool {
    tx: Sender<DecodeResult>,
    rx: Receiver<DecodeResult>,
    outstanding: usize,
}

impl Default for DecodePool {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodePool {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            outstanding: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.outstanding
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }

    /// Decode `bytes` and write the result into the layer's buffer once
    /// ready.  Until then the layer renders as empty (`pending_decode`).
    pub fn decode_into_layer(&mut self, layer_id: u64, bytes: Vec<u8>) {
        self.spawn(DecodeTarget::Fill { layer_id }, bytes);
    }

    /// Decode `bytes` and add the result as a new image layer, auto-scaled
    /// down to fit the canvas.  Recorded in history on completion.
    pub fn import_image(&mut self, bytes: Vec<u8>) {
        self.spawn(DecodeTarget::Import, bytes);
    }

    fn spawn(&mut self, target: DecodeTarget, bytes: Vec<u8>) {
        let tx = self.tx.clone();
        self.outstanding += 1;
        thread::spawn(move || {
            let outcome = io::decode_image(&bytes);
            // Receiver gone means the pool was dropped; nothing to deliver to.
            let _ = tx.send(DecodeResult { target, outcome });
        });
    }

    /// Apply every decode that has finished.  Non-blocking; returns the
    /// failures so the shell can surface them.
    pub fn poll(
        &mut self,
        state: &mut EditorState,
        history: &mut HistoryManager,
    ) -> Vec<EditorError> {
        let mut failures = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            self.apply(result, state, history, &mut failures);
        }
        failures
    }

    /// Block until every outstanding decode has been applied.  Used by tests
    /// and by shells that need a barrier (e.g. right before export).
    pub fn flush(
        &mut self,
        state: &mut EditorState,
        history: &mut HistoryManager,
    ) -> Vec<EditorError> {
        let mut failures = Vec::new();
        while self.outstanding > 0 {
            match self.rx.recv() {
                Ok(result) => {
                    self.outstanding -= 1;
                    self.apply(result, state, history, &mut failures);
                }
                Err(_) => break,
            }
        }
        failures
    }

    fn apply(
        &mut self,
        result: DecodeResult,
        state: &mut EditorState,
        history: &mut HistoryManager,
        failures: &mut Vec<EditorError>,
    ) {
        match (result.target, result.outcome) {
            (DecodeTarget::Fill { layer_id }, Ok(img)) => {
                let Some(layer) = state.layer_mut(layer_id) else {
                    // Layer was removed again before its pixels arrived.
                    return;
                };
                if img.dimensions() == (layer.original_width, layer.original_height) {
                    layer.pixels = img;
                } else {
                    let mut buf = RgbaImage::new(layer.original_width, layer.original_height);
                    image::imageops::replace(&mut buf, &img, 0, 0);
                    layer.pixels = buf;
                }
                layer.pending_decode = false;
            }
            (DecodeTarget::Fill { layer_id }, Err(e)) => {
                if let Some(layer) = state.layer_mut(layer_id) {
                    layer.pending_decode = false;
                }
                log_err!("decode for layer {} failed: {}", layer_id, e);
                failures.push(e);
            }
            (DecodeTarget::Import, Ok(img)) => {
                layers::add_image_layer(state, history, img);
            }
            (DecodeTarget::Import, Err(e)) => {
                log_err!("image import failed: {}", e);
                failures.push(e);
            }
        }
    }
}
