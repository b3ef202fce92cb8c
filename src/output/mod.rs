/*!
 * Frame Output
 *
 * Turns captured frames into files: sequence naming, the timestamp stamp,
 * and image encoding.
 */

pub mod encoder;
pub mod namer;
pub mod overlay;

pub use encoder::{clamp_quality, FrameEncoder};
pub use namer::{next_path, SequenceNamer};
pub use overlay::{stamp_timestamp, timestamp_text};
