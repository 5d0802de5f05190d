//! Frame sources
//!
//! The engine does not run a pose model. Frames arrive through a
//! `PoseProvider`, which yields one `FrameSample` at a time and owns whatever
//! resource backs the stream. Resources are released when the provider is
//! dropped, on every exit path.

use crate::error::AnalysisError;
use crate::schema::{LandmarkStreamReader, StreamRecord};
use crate::types::FrameSample;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Supplies frames to an analysis, in order
pub trait PoseProvider {
    /// Capture frame rate, if the source knows it
    fn fps(&self) -> Option<f64>;

    /// Opaque description of the source, carried into the result
    fn label(&self) -> Option<String> {
        None
    }

    /// Next frame, or `Ok(None)` once the stream is exhausted.
    ///
    /// A recoverable error (see `AnalysisError::is_recoverable`) means this one
    /// frame could not be decoded and the stream may continue; any other
    /// error ends the stream.
    fn next_frame(&mut self) -> Result<Option<FrameSample>, AnalysisError>;
}

/// In-memory frames, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: std::vec::IntoIter<FrameSample>,
    fps: Option<f64>,
}

impl VecSource {
    pub fn new(frames: Vec<FrameSample>) -> Self {
        Self {
            frames: frames.into_iter(),
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

impl PoseProvider for VecSource {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<FrameSample>, AnalysisError> {
        Ok(self.frames.next())
    }
}

/// Lazily decoded pose.landmark_stream.v1 stream
///
/// The stream header, when present, is read on construction so the frame rate
/// is known before the first frame is requested.
pub struct LandmarkFileSource<R = BufReader<File>> {
    reader: R,
    label: String,
    fps: Option<f64>,
    line_number: usize,
    pending: Option<Result<FrameSample, AnalysisError>>,
    frames_read: u64,
}

impl LandmarkFileSource<BufReader<File>> {
    /// Open a landmark stream file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            AnalysisError::SourceUnavailable(format!("{}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "opened landmark stream");
        Self::from_reader(BufReader::new(file), path.display().to_string())
    }
}

impl<R: BufRead> LandmarkFileSource<R> {
    pub fn from_reader(reader: R, label: impl Into<String>) -> Result<Self, AnalysisError> {
        let mut source = Self {
            reader,
            label: label.into(),
            fps: None,
            line_number: 0,
            pending: None,
            frames_read: 0,
        };

        // Only the first record may be the header
        match source.read_record() {
            Ok(Some(StreamRecord::Stream(header))) => {
                header
                    .validate()
                    .map_err(|e| AnalysisError::InvalidStream(e.to_string()))?;
                source.fps = header.fps;
                if let Some(origin) = header.source {
                    source.label = origin;
                }
            }
            Ok(Some(StreamRecord::Frame(frame))) => {
                source.pending = Some(Self::accept(frame, source.line_number));
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable() => source.pending = Some(Err(e)),
            Err(e) => return Err(e),
        }

        Ok(source)
    }

    /// Read up to the next non-blank line
    fn read_record(&mut self) -> Result<Option<StreamRecord>, AnalysisError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            // A bad line is a frame fault; the next line is still readable
            let line = std::str::from_utf8(&buf).map_err(|e| AnalysisError::FrameDecode {
                line: self.line_number,
                message: e.to_string(),
            })?;
            if let Some(record) = LandmarkStreamReader::parse_line(line, self.line_number)? {
                return Ok(Some(record));
            }
        }
    }

    fn accept(
        frame: crate::schema::FrameRecord,
        line: usize,
    ) -> Result<FrameSample, AnalysisError> {
        frame.validate().map_err(|e| AnalysisError::FrameDecode {
            line,
            message: e.to_string(),
        })?;
        Ok(frame.into_sample())
    }
}

impl<R: BufRead> PoseProvider for LandmarkFileSource<R> {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn label(&self) -> Option<String> {
        Some(self.label.clone())
    }

    fn next_frame(&mut self) -> Result<Option<FrameSample>, AnalysisError> {
        if let Some(pending) = self.pending.take() {
            self.frames_read += 1;
            return pending.map(Some);
        }

        loop {
            match self.read_record()? {
                None => return Ok(None),
                Some(StreamRecord::Frame(frame)) => {
                    self.frames_read += 1;
                    return Self::accept(frame, self.line_number).map(Some);
                }
                Some(StreamRecord::Stream(_)) => {
                    tracing::warn!(line = self.line_number, "ignoring stream header after first record");
                }
            }
        }
    }
}

impl<R> Drop for LandmarkFileSource<R> {
    fn drop(&mut self) {
        tracing::debug!(
            source = %self.label,
            frames_read = self.frames_read,
            "released landmark stream"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn source(text: &str) -> LandmarkFileSource<Cursor<Vec<u8>>> {
        LandmarkFileSource::from_reader(Cursor::new(text.as_bytes().to_vec()), "memory").unwrap()
    }

    #[test]
    fn test_header_sets_fps_and_label() {
        let mut src = source(
            r#"{"type":"stream","schema_version":"pose.landmark_stream.v1","fps":24.0,"source":"cam0"}
{"type":"frame","index":0,"landmarks":null}"#,
        );
        assert_eq!(src.fps(), Some(24.0));
        assert_eq!(src.label().as_deref(), Some("cam0"));
        assert_eq!(src.next_frame().unwrap(), Some(FrameSample::not_detected()));
        assert_eq!(src.next_frame().unwrap(), None);
    }

    #[test]
    fn test_headerless_stream() {
        let mut src = source(
            "{\"type\":\"frame\",\"landmarks\":null}\n\n{\"type\":\"frame\",\"landmarks\":null}\n",
        );
        assert_eq!(src.fps(), None);
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_bad_line_is_recoverable() {
        let mut src = source(
            "{\"type\":\"frame\",\"landmarks\":null}\n{garbage\n{\"type\":\"frame\",\"landmarks\":null}\n",
        );
        assert!(src.next_frame().unwrap().is_some());
        match src.next_frame() {
            Err(AnalysisError::FrameDecode { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_bad_first_line_is_recoverable() {
        let mut src = source("{garbage\n{\"type\":\"frame\",\"landmarks\":null}\n");
        assert!(src.next_frame().unwrap_err().is_recoverable());
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_non_utf8_line_is_recoverable() {
        let mut bytes = b"{\"type\":\"frame\",\"landmarks\":null}\n".to_vec();
        bytes.extend_from_slice(b"{\"type\":\"frame\",\"landmarks\":\xff\xfe}\n");
        bytes.extend_from_slice(b"{\"type\":\"frame\",\"landmarks\":null}\n");
        let mut src = LandmarkFileSource::from_reader(Cursor::new(bytes), "memory").unwrap();

        assert!(src.next_frame().unwrap().is_some());
        match src.next_frame() {
            Err(AnalysisError::FrameDecode { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(src.next_frame().unwrap(), Some(FrameSample::not_detected()));
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_non_utf8_first_line_is_recoverable() {
        let mut bytes = b"\xff\xfe\n".to_vec();
        bytes.extend_from_slice(b"{\"type\":\"frame\",\"landmarks\":null}\n");
        let mut src = LandmarkFileSource::from_reader(Cursor::new(bytes), "memory").unwrap();

        assert!(src.next_frame().unwrap_err().is_recoverable());
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_invalid_frame_is_recoverable() {
        let mut src = source(
            r#"{"type":"frame","landmarks":{"left_hip":{"x":0.5,"y":0.5,"visibility":3.0}}}"#,
        );
        assert!(src.next_frame().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_wrong_schema_version_rejected() {
        let result = LandmarkFileSource::from_reader(
            Cursor::new(br#"{"type":"stream","schema_version":"other.v2"}"#.to_vec()),
            "memory",
        );
        assert!(matches!(result, Err(AnalysisError::InvalidStream(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = LandmarkFileSource::open("/nonexistent/clip.ndjson");
        assert!(matches!(result, Err(AnalysisError::SourceUnavailable(_))));
    }

    #[test]
    fn test_vec_source() {
        let mut src = VecSource::new(vec![FrameSample::not_detected()]).with_fps(60.0);
        assert_eq!(src.fps(), Some(60.0));
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }
}
