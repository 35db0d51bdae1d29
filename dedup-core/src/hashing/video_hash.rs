use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags};
use tracing::debug;

use dedup_model::{FileId, VideoSignature};

use crate::error::{DedupError, Result};

const FRAME_HASH_WIDTH: u32 = 9;
const FRAME_HASH_HEIGHT: u32 = 8;

const TAIL_MARGIN_SECONDS: f64 = 1.0;
const END_CLAMP_SECONDS: f64 = 0.25;
const COLLAPSE_EPSILON_SECONDS: f64 = 1e-3;
const SHORT_VIDEO_SECONDS: f64 = 2.0;

/// Computes the three candidate sample times `{0, duration/2, duration-1}`
/// each clamped into `[0, duration - 0.25s]`, collapsed
/// when within 1ms of a neighbor, and for durations under 2s only the
/// start and end are kept.
fn sample_times(duration_seconds: f64) -> Vec<f64> {
    if duration_seconds <= 0.0 {
        return vec![0.0];
    }
    let clamp_max = (duration_seconds - END_CLAMP_SECONDS).max(0.0);
    let clamp = |t: f64| t.clamp(0.0, clamp_max);

    let candidates = if duration_seconds < SHORT_VIDEO_SECONDS {
        vec![clamp(0.0), clamp(duration_seconds)]
    } else {
        vec![
            clamp(0.0),
            clamp(duration_seconds / 2.0),
            clamp((duration_seconds - TAIL_MARGIN_SECONDS).max(0.0)),
        ]
    };

    let mut times: Vec<f64> = Vec::with_capacity(candidates.len());
    for t in candidates {
        if times
            .last()
            .map(|last: &f64| (t - last).abs() <= COLLAPSE_EPSILON_SECONDS)
            .unwrap_or(false)
        {
            continue;
        }
        times.push(t);
    }
    times
}

/// Samples frames at the required times and computes a dHash-style
/// per-frame hash for each. Returns a signature with an
/// empty `frame_hashes` list when the asset is unreadable or yields zero
/// decodable frames; callers treat that as "no signal", not an error.
pub fn hash_video(path: &Path, file_id: FileId) -> Result<VideoSignature> {
    ffmpeg::init().map_err(DedupError::Ffmpeg)?;

    let mut input = ffmpeg::format::input(path).map_err(DedupError::Ffmpeg)?;
    let Some(stream) = input.streams().best(ffmpeg::media::Type::Video) else {
        return Ok(empty_signature(file_id));
    };
    let stream_index = stream.index();
    let time_base = f64::from(stream.time_base());

    let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(DedupError::Ffmpeg)?;
    let Ok(mut decoder) = context.decoder().video() else {
        return Ok(empty_signature(file_id));
    };

    let duration_seconds = if input.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
        input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };

    let mut scaler = ScalingContext::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::GRAY8,
        FRAME_HASH_WIDTH,
        FRAME_HASH_HEIGHT,
        Flags::BILINEAR,
    )
    .map_err(DedupError::Ffmpeg)?;

    let targets = sample_times(duration_seconds);
    let width = decoder.width();
    let height = decoder.height();
    let mut frame_hashes = Vec::with_capacity(targets.len());
    let mut decoded = ffmpeg::util::frame::Video::empty();
    let mut scaled = ffmpeg::util::frame::Video::empty();
    let mut next_target = 0usize;

    'demux: for (packet_stream, packet) in input.packets() {
        if packet_stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet).map_err(DedupError::Ffmpeg)?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            if next_target >= targets.len() {
                break 'demux;
            }
            let pts_seconds = decoded.pts().map(|pts| pts as f64 * time_base).unwrap_or(0.0);
            if pts_seconds + 1e-6 < targets[next_target] {
                continue;
            }
            scaler.run(&decoded, &mut scaled).map_err(DedupError::Ffmpeg)?;
            frame_hashes.push(frame_dhash(&scaled));
            next_target += 1;
        }
    }

    if frame_hashes.is_empty() {
        debug!(path = %path.display(), "video hashing produced no frames");
    }

    Ok(VideoSignature {
        file_id,
        duration_seconds,
        width,
        height,
        sample_times: targets[..frame_hashes.len()].to_vec(),
        frame_hashes,
        computed_at: chrono::Utc::now(),
    })
}

fn empty_signature(file_id: FileId) -> VideoSignature {
    VideoSignature {
        file_id,
        duration_seconds: 0.0,
        width: 0,
        height: 0,
        frame_hashes: Vec::new(),
        sample_times: Vec::new(),
        computed_at: chrono::Utc::now(),
    }
}

fn frame_dhash(frame: &ffmpeg::util::frame::Video) -> u64 {
    let data = frame.data(0);
    let stride = frame.stride(0);
    let mut hash: u64 = 0;
    let mut bit = 0u32;
    for y in 0..FRAME_HASH_HEIGHT as usize {
        for x in 0..(FRAME_HASH_WIDTH as usize - 1) {
            let left = data[y * stride + x];
            let right = data[y * stride + x + 1];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}
