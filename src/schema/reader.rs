//! Parsing and batch validation of pose.landmark_stream.v1 documents

use crate::error::AnalysisError;
use crate::schema::landmark_stream::*;
use crate::types::FrameSample;

/// Reader for landmark stream documents held in memory
pub struct LandmarkStreamReader;

impl LandmarkStreamReader {
    /// Decode one NDJSON line. Blank lines yield `None`.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Option<StreamRecord>, AnalysisError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<StreamRecord>(trimmed)
            .map(Some)
            .map_err(|e| AnalysisError::FrameDecode {
                line: line_number,
                message: e.to_string(),
            })
    }

    /// Parse NDJSON, failing on the first undecodable line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<StreamRecord>, AnalysisError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            if let Some(record) = Self::parse_line(line, line_num + 1)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<StreamRecord>, AnalysisError> {
        let records: Vec<StreamRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Split records into the stream header (if any) and frame samples
    pub fn into_frames(records: Vec<StreamRecord>) -> (Option<StreamHeader>, Vec<FrameSample>) {
        let mut header = None;
        let mut frames = Vec::new();
        for record in records {
            match record {
                StreamRecord::Stream(h) => {
                    header.get_or_insert(h);
                }
                StreamRecord::Frame(frame) => frames.push(frame.into_sample()),
            }
        }
        (header, frames)
    }

    /// Validate a batch of records, including their order. Only failures are
    /// returned.
    pub fn validate_records(records: &[StreamRecord]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous_index: Option<u64> = None;

        for (idx, record) in records.iter().enumerate() {
            let frame_index = match record {
                StreamRecord::Frame(frame) => frame.index,
                StreamRecord::Stream(_) => None,
            };

            let mut error = record.validate().err();

            if error.is_none() {
                error = match record {
                    StreamRecord::Stream(_) if idx > 0 => Some(ValidationError::HeaderNotFirst),
                    StreamRecord::Frame(FrameRecord {
                        index: Some(actual),
                        ..
                    }) => match previous_index {
                        Some(previous) if *actual <= previous => {
                            Some(ValidationError::IndexOutOfOrder {
                                previous,
                                actual: *actual,
                            })
                        }
                        _ => None,
                    },
                    _ => None,
                };
            }

            if let Some(index) = frame_index {
                previous_index = Some(index);
            }

            if let Some(error) = error {
                results.push(ValidationResult {
                    index: idx,
                    frame_index,
                    error,
                });
            }
        }

        results
    }
}

/// A record that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Position of the record in the document
    pub index: usize,
    pub frame_index: Option<u64>,
    pub error: ValidationError,
}
