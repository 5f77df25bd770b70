//! Audio file decoding

use crate::{resampling::resample, AudioError};
use hound::WavReader;
use std::path::Path;

/// Sample rate expected by the transcription and diarization models
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Extensions accepted for upload (matches the UI file picker)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "wma"];

/// Load an audio file and return samples at 16 kHz mono.
///
/// WAV is decoded with hound; the remaining formats go through
/// symphonia. Unknown extensions are rejected before any I/O.
pub fn load_audio_file(path: &Path) -> Result<Vec<f32>, AudioError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AudioError::UnsupportedFormat(ext));
    }

    let samples = match ext.as_str() {
        "wav" => load_wav(path)?,
        _ => load_with_symphonia(path)?,
    };

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }

    tracing::debug!(
        "Decoded {:?}: {:.1}s at {}Hz mono",
        path.file_name().unwrap_or_default(),
        samples.len() as f64 / WHISPER_SAMPLE_RATE as f64,
        WHISPER_SAMPLE_RATE
    );

    Ok(samples)
}

/// Load WAV file using hound
fn load_wav(path: &Path) -> Result<Vec<f32>, AudioError> {
    let reader = WavReader::open(path)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };

    let mono = downmix(samples, channels);

    if sample_rate != WHISPER_SAMPLE_RATE {
        resample(&mono, sample_rate, WHISPER_SAMPLE_RATE)
    } else {
        Ok(mono)
    }
}

/// Load audio using symphonia (mp3, m4a, aac, ogg, flac, wma)
fn load_with_symphonia(path: &Path) -> Result<Vec<f32>, AudioError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed =
        symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or(AudioError::MissingStreamInfo("an audio track"))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(AudioError::MissingStreamInfo("a sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .ok_or(AudioError::MissingStreamInfo("a channel layout"))?
        .count();

    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // Symphonia signals end of stream as an UnexpectedEof
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        samples.extend_from_slice(sample_buf.samples());
    }

    let mono = downmix(samples, channels);

    if sample_rate != WHISPER_SAMPLE_RATE {
        resample(&mono, sample_rate, WHISPER_SAMPLE_RATE)
    } else {
        Ok(mono)
    }
}

/// Average interleaved channels down to mono
fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (sample_rate as f32 * seconds) as usize * channels as usize;
        for _ in 0..total {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_audio_file(Path::new("/tmp/notes.txt")).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(ext) if ext == "txt"));
    }

    #[test]
    fn loads_16k_mono_wav_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, WHISPER_SAMPLE_RATE, 1, 2.0);

        let samples = load_audio_file(&path).unwrap();
        assert_eq!(samples.len(), WHISPER_SAMPLE_RATE as usize * 2);
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, WHISPER_SAMPLE_RATE, 2, 1.0);

        let samples = load_audio_file(&path).unwrap();
        assert_eq!(samples.len(), WHISPER_SAMPLE_RATE as usize);
    }

    #[test]
    fn resamples_to_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cd.wav");
        write_wav(&path, 44_100, 1, 1.0);

        let samples = load_audio_file(&path).unwrap();
        // Resampler output lands within a few percent of the ideal length
        let expected = WHISPER_SAMPLE_RATE as usize;
        assert!(
            (samples.len() as i64 - expected as i64).unsigned_abs() < expected as u64 / 10,
            "got {} samples, expected about {}",
            samples.len(),
            expected
        );
    }

    #[test]
    fn corrupt_compressed_stream_surfaces_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, vec![0xAB; 2048]).unwrap();

        let err = load_audio_file(&path).unwrap_err();
        assert!(matches!(err, AudioError::Codec(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_audio_file(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Wav(_)));
    }
}
