//! pose.landmark_stream.v1 schema
//!
//! This module defines the input format for landmark streams produced by an
//! external pose model, one JSON record per line.

mod landmark_stream;
mod reader;

pub use landmark_stream::*;
pub use reader::*;
