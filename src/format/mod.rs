//! Resource formats: TIFF structure, octave file names and backend choice.
//!
//! # Backend Detection
//!
//! Use [`detect::select_backend`] to decide how an identifier is opened:
//!
//! - **Tiled store**: a TIFF whose first directory is tiled, either a
//!   single file or one file per octave named by a template
//! - **In-memory pyramid**: everything else, decoded whole

pub mod detect;
pub mod template;
pub mod tiff;

pub use detect::{probe_tiled, select_backend, Backend, STDIN_IDENTIFIER};
pub use template::{has_octave_placeholder, octave_path};
