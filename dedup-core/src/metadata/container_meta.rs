use std::path::Path;

use ffmpeg_next as ffmpeg;
use tracing::debug;

use dedup_model::MediaMetadata;

use crate::error::{DedupError, Result};

static INIT: std::sync::Once = std::sync::Once::new();

fn ensure_ffmpeg_initialized() -> Result<()> {
    let mut init_result = Ok(());
    INIT.call_once(|| {
        init_result = ffmpeg::init().map_err(DedupError::Ffmpeg);
    });
    init_result
}

/// Probes a video or audio container for dimensions, duration, frame
/// rate, and codec tag without decoding any frames. Frame
/// decode for perceptual hashing reuses this same probe.
pub fn probe_container(path: &Path, file_id: dedup_model::FileId) -> Result<MediaMetadata> {
    ensure_ffmpeg_initialized()?;

    let input = ffmpeg::format::input(path).map_err(DedupError::Ffmpeg)?;
    let mut meta = MediaMetadata::empty(file_id);

    if input.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
        meta.duration_seconds = Some(input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64);
    }

    let mut best_video: Option<(usize, u32, u32, ffmpeg::Rational, String)> = None;

    for (index, stream) in input.streams().enumerate() {
        let codec = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(DedupError::Ffmpeg)?;

        if codec.medium() == ffmpeg::media::Type::Video {
            if let Ok(video) = codec.decoder().video() {
                let width = video.width();
                let height = video.height();
                let codec_name = video.codec().map(|c| c.name().to_string()).unwrap_or_default();
                let is_thumbnail = codec_name == "mjpeg" || width < 64 || height < 64;
                let better = best_video
                    .as_ref()
                    .map(|(_, w, ..)| width > *w)
                    .unwrap_or(true);
                if !is_thumbnail && better {
                    best_video = Some((index, width, height, stream.avg_frame_rate(), codec_name));
                }
            }
        }
    }

    if let Some((_, width, height, frame_rate, codec_name)) = best_video {
        meta.width = Some(width);
        meta.height = Some(height);
        meta.codec_tag = Some(codec_name);
        if frame_rate.denominator() != 0 {
            meta.frame_rate = Some(frame_rate.numerator() as f64 / frame_rate.denominator() as f64);
        }
    } else {
        debug!(path = %path.display(), "container probe found no usable video stream; treating as audio-only");
    }

    Ok(meta)
}
