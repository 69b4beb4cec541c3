//! Pipeline stages for document extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and a collaborator (transport, PDF tool, clock) can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ compress ──▶ analysis ──▶ normalize ──▶ segment
//! (upload)  (gs / JPEG)  (submit+poll) (shapes)     (sentences)
//! ```
//!
//! 1. [`input`]     — the uploaded artifact, media-kind detection, scoped cleanup
//! 2. [`compress`]  — pick a compression plan from size and type; dispatches to
//!    [`ghostscript`] for PDFs and [`raster`] for images
//! 3. [`analysis`]  — submit the artifact and drive the poll state machine over
//!    a [`transport`]; the only stage with network I/O
//! 4. [`normalize`] — map whichever result shape came back to ordered pages
//! 5. [`segment`]   — split each page's text into sentences

pub mod analysis;
pub mod compress;
pub mod ghostscript;
pub mod input;
pub mod normalize;
pub mod raster;
pub mod segment;
pub mod transport;
