use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use rubato::{FftFixedIn, Resampler};
use symphonia::core::{
    audio::{SampleBuffer, SignalSpec},
    codecs::{Decoder as SymphoniaDecoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use thiserror::Error;
use tracing::debug;

use super::{CHANNELS, SAMPLE_RATE};

const RESAMPLE_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot open `{}` for decoding: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("decode failed: {0}")]
    Stream(String),

    #[error("resampler error: {0}")]
    Resample(String),
}

/// Streaming decoder producing fixed-size frames of 48kHz stereo i16 PCM.
///
/// The symphonia reader and codec are owned by this value and released when
/// it is dropped.
pub struct PcmDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    frame_samples: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    resampler: Option<StereoResampler>,
    source_rate: Option<u32>,
    pending: Vec<i16>,
    finished: bool,
}

impl PcmDecoder {
    /// Opens `path` and prepares a decoder emitting `frame_size` samples per
    /// channel per frame.
    pub fn open(path: &Path, frame_size: usize) -> Result<Self, DecodeError> {
        let open_err = |reason: String| DecodeError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| open_err(format!("probe failed: {e}")))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| open_err("missing default audio track".to_string()))?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| open_err(format!("decoder init failed: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            frame_samples: frame_size * CHANNELS,
            sample_buf: None,
            resampler: None,
            source_rate: None,
            pending: Vec::new(),
            finished: false,
        })
    }

    /// Returns the next full frame, or `None` once the stream is exhausted.
    ///
    /// The last frame is padded with silence. Packets that decode to nothing
    /// are skipped without ending the stream.
    pub fn next_frame(&mut self) -> Result<Option<Vec<i16>>, DecodeError> {
        while self.pending.len() < self.frame_samples && !self.finished {
            if !self.decode_packet()? {
                self.finish()?;
            }
        }

        if self.pending.len() >= self.frame_samples {
            return Ok(Some(self.pending.drain(..self.frame_samples).collect()));
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let mut frame = std::mem::take(&mut self.pending);
        frame.resize(self.frame_samples, 0);
        Ok(Some(frame))
    }

    /// Decodes one packet into `pending`. Returns `false` at end of stream.
    fn decode_packet(&mut self) -> Result<bool, DecodeError> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(false);
            }
            Err(e) => return Err(DecodeError::Stream(e.to_string())),
        };

        if packet.track_id() != self.track_id {
            return Ok(true);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Paquete corrupto descartado: {}", e);
                return Ok(true);
            }
            Err(SymphoniaError::ResetRequired) => {
                self.decoder.reset();
                return Ok(true);
            }
            Err(e) => return Err(DecodeError::Stream(e.to_string())),
        };

        if decoded.frames() == 0 {
            return Ok(true);
        }

        let spec = SignalSpec::new(decoded.spec().rate, decoded.spec().channels);
        let capacity = decoded.capacity();
        let needs_realloc = self
            .sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < capacity * spec.channels.count());
        if needs_realloc {
            self.sample_buf = Some(SampleBuffer::<f32>::new(capacity as u64, spec));
        }

        let stereo = match self.sample_buf.as_mut() {
            Some(buf) => {
                buf.copy_interleaved_ref(decoded);
                to_stereo(buf.samples(), spec.channels.count())
            }
            None => return Ok(true),
        };

        self.push_stereo(spec.rate, &stereo)?;
        Ok(true)
    }

    fn push_stereo(&mut self, rate: u32, stereo: &[f32]) -> Result<(), DecodeError> {
        if self.source_rate.is_none() {
            self.source_rate = Some(rate);
            if rate != SAMPLE_RATE {
                debug!("Remuestreando {}Hz -> {}Hz", rate, SAMPLE_RATE);
                self.resampler = Some(StereoResampler::new(rate)?);
            }
        }

        match self.resampler.as_mut() {
            Some(resampler) => resampler.push(stereo, &mut self.pending),
            None => {
                self.pending.extend(stereo.iter().copied().map(to_i16));
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        self.finished = true;
        match self.resampler.as_mut() {
            Some(resampler) => resampler.flush(&mut self.pending),
            None => Ok(()),
        }
    }
}

impl Drop for PcmDecoder {
    fn drop(&mut self) {
        debug!("Decoder liberado (track {})", self.track_id);
    }
}

/// Resamples interleaved stereo to the output rate in fixed input chunks.
struct StereoResampler {
    inner: FftFixedIn<f32>,
    input: [Vec<f32>; CHANNELS],
}

impl StereoResampler {
    fn new(source_rate: u32) -> Result<Self, DecodeError> {
        let inner = FftFixedIn::<f32>::new(
            source_rate as usize,
            SAMPLE_RATE as usize,
            RESAMPLE_CHUNK,
            2,
            CHANNELS,
        )
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

        Ok(Self {
            inner,
            input: [Vec::new(), Vec::new()],
        })
    }

    fn push(&mut self, stereo: &[f32], out: &mut Vec<i16>) -> Result<(), DecodeError> {
        for frame in stereo.chunks_exact(CHANNELS) {
            self.input[0].push(frame[0]);
            self.input[1].push(frame[1]);
        }

        loop {
            let needed = self.inner.input_frames_next();
            if self.input[0].len() < needed {
                return Ok(());
            }

            let chunk: Vec<Vec<f32>> = self
                .input
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = self
                .inner
                .process(&chunk, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            interleave(&resampled, out);
        }
    }

    fn flush(&mut self, out: &mut Vec<i16>) -> Result<(), DecodeError> {
        if self.input[0].is_empty() {
            return Ok(());
        }

        let chunk: Vec<Vec<f32>> = self.input.iter_mut().map(std::mem::take).collect();
        let resampled = self
            .inner
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        interleave(&resampled, out);
        Ok(())
    }
}

/// Maps interleaved audio with any channel count onto stereo.
///
/// Mono is duplicated; channels past the second are dropped.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

fn interleave(planar: &[Vec<f32>], out: &mut Vec<i16>) {
    let (Some(left), Some(right)) = (planar.first(), planar.get(1)) else {
        return;
    };
    for (&l, &r) in left.iter().zip(right) {
        out.push(to_i16(l));
        out.push(to_i16(r));
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
