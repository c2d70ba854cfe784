//! Read-transform-write loop over raw RGB24 frame streams.

use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use super::overlay::{FrameOverlay, FrameView};
use crate::error::{MediaError, MediaResult};

/// Fixed frame layout of a raw stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Bytes per RGB24 frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Presentation time of frame `index`.
    pub fn timestamp(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }
}

/// Counters from one pass over a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Frames forwarded to the encoder
    pub frames: u64,
    /// Frames the overlay drew on
    pub composited: u64,
    pub first_composited: Option<u64>,
    pub last_composited: Option<u64>,
}

impl FrameStats {
    fn record(&mut self, index: u64, drawn: bool) {
        self.frames += 1;
        if drawn {
            self.composited += 1;
            self.first_composited.get_or_insert(index);
            self.last_composited = Some(index);
        }
    }
}

/// Fill `buf` from `reader`. Returns the byte count, short only at end of stream.
async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Stream frames from `reader` through `overlay` into `writer`.
///
/// One buffer is reused for every frame. Frames are handled strictly in
/// stream order and timestamped by ordinal position. A trailing partial
/// frame ends the stream. Any failed write to `writer` means the consumer
/// went away and is reported as [`MediaError::PipeClosed`]. The writer is
/// shut down once the reader is exhausted.
pub async fn pump_frames<R, W, O>(
    reader: &mut R,
    writer: &mut W,
    geometry: FrameGeometry,
    overlay: &mut O,
) -> MediaResult<FrameStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    O: FrameOverlay + ?Sized,
{
    let frame_size = geometry.frame_size();
    if frame_size == 0 || geometry.fps <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "invalid frame geometry {}x{} @ {} fps",
            geometry.width, geometry.height, geometry.fps
        )));
    }

    let mut buf = vec![0u8; frame_size];
    let mut stats = FrameStats::default();

    loop {
        let filled = read_frame(reader, &mut buf).await?;
        if filled == 0 {
            break;
        }
        if filled < frame_size {
            warn!(
                bytes = filled,
                expected = frame_size,
                frame = stats.frames,
                "Dropping truncated trailing frame"
            );
            break;
        }

        let index = stats.frames;
        let drawn = {
            let mut frame = FrameView::from_raw(geometry.width, geometry.height, buf.as_mut_slice())
                .ok_or_else(|| MediaError::internal("frame buffer does not match geometry"))?;
            overlay.apply(index, geometry.timestamp(index), &mut frame)
        };

        writer.write_all(&buf).await.map_err(|e| {
            warn!(frame = index, error = %e, "Encoder input closed");
            MediaError::PipeClosed {
                frames_written: stats.frames,
            }
        })?;
        stats.record(index, drawn);

        if index % 300 == 0 {
            trace!(frame = index, composited = stats.composited, "Frame pump");
        }
    }

    writer
        .shutdown()
        .await
        .map_err(|_| MediaError::PipeClosed {
            frames_written: stats.frames,
        })?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::CaptionTimeline;
    use crate::compositor::overlay::{CaptionOverlay, CaptionRasterizer};
    use crate::text::Sprite;
    use image::{Rgba, RgbaImage};
    use reel_models::CaptionSegment;
    use std::io::Cursor;

    struct Marker;

    impl CaptionRasterizer for Marker {
        fn rasterize(&mut self, _segment: &CaptionSegment, _w: u32, _h: u32) -> Option<Sprite> {
            Some(Sprite::new(1, 1, RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]))))
        }
    }

    struct Nothing;

    impl FrameOverlay for Nothing {
        fn apply(&mut self, _index: u64, _timestamp: f64, _frame: &mut FrameView<'_>) -> bool {
            false
        }
    }

    fn caption_overlay(start: f64, end: f64) -> CaptionOverlay<Marker> {
        let segment = CaptionSegment {
            display_text: "caption".into(),
            words: vec!["caption".into()],
            highlight_index: 0,
            start_sec: start,
            end_sec: end,
        };
        CaptionOverlay::new(CaptionTimeline::new(vec![segment]), Marker)
    }

    #[tokio::test]
    async fn test_ten_second_video_modifies_exactly_the_caption_span() {
        let geometry = FrameGeometry::new(8, 4, 30.0);
        let frame_size = geometry.frame_size();
        let mut reader = Cursor::new(vec![0u8; 300 * frame_size]);
        let mut writer: Vec<u8> = Vec::new();
        let mut overlay = caption_overlay(2.0, 4.0);

        let stats = pump_frames(&mut reader, &mut writer, geometry, &mut overlay)
            .await
            .unwrap();

        assert_eq!(stats.frames, 300);
        assert_eq!(stats.composited, 60);
        assert_eq!(stats.first_composited, Some(60));
        assert_eq!(stats.last_composited, Some(119));

        assert_eq!(writer.len(), 300 * frame_size);
        let modified: Vec<usize> = writer
            .chunks(frame_size)
            .enumerate()
            .filter(|(_, frame)| frame.iter().any(|&b| b != 0))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(modified, (60..120).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_frames_split_across_reads_and_truncated_tail() {
        let geometry = FrameGeometry::new(2, 2, 25.0);
        let frame: Vec<u8> = (0..12).collect();
        let mut reader = tokio_test::io::Builder::new()
            .read(&frame[..5])
            .read(&frame[5..])
            .read(&[1, 2, 3])
            .build();
        let mut writer: Vec<u8> = Vec::new();

        let stats = pump_frames(&mut reader, &mut writer, geometry, &mut Nothing)
            .await
            .unwrap();

        assert_eq!(stats.frames, 1);
        assert_eq!(writer, frame);
    }

    #[tokio::test]
    async fn test_closed_encoder_pipe_is_a_failure() {
        let geometry = FrameGeometry::new(2, 2, 25.0);
        let mut reader = Cursor::new(vec![0u8; 3 * geometry.frame_size()]);
        let mut writer = tokio_test::io::Builder::new()
            .write(&[0u8; 12])
            .write_error(io::Error::from(io::ErrorKind::BrokenPipe))
            .build();

        let err = pump_frames(&mut reader, &mut writer, geometry, &mut Nothing)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::PipeClosed { frames_written: 1 }));
    }

    #[tokio::test]
    async fn test_empty_stream_yields_no_frames() {
        let geometry = FrameGeometry::new(2, 2, 30.0);
        let mut reader = Cursor::new(Vec::<u8>::new());
        let mut writer: Vec<u8> = Vec::new();

        let stats = pump_frames(&mut reader, &mut writer, geometry, &mut Nothing)
            .await
            .unwrap();
        assert_eq!(stats, FrameStats::default());
    }

    #[test]
    fn test_geometry() {
        let geometry = FrameGeometry::new(1920, 1080, 30.0);
        assert_eq!(geometry.frame_size(), 6_220_800);
        assert_eq!(geometry.timestamp(60), 2.0);
    }
}
