//! Pipeline stages for image translation.
//!
//! Each submodule implements exactly one step of the `trimg` flow, so each is
//! testable on its own and the OCR engine can be swapped without touching
//! download or cleanup code.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ ocr ──▶ postprocess
//! (fetch+stage) (base64)  (VLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: fetch attachment bytes and stage them in a temp file that
//!    is deleted when the image is done
//! 2. [`encode`]: decode, downscale and PNG/base64-wrap the staged file;
//!    CPU-bound, runs in `spawn_blocking`
//! 3. [`ocr`]: drive the vision call with retry/backoff under a timeout
//! 4. [`postprocess`]: turn the raw model reply into ordered text lines
//!
//! Translation of the recognised lines happens in [`crate::relay`].

pub mod encode;
pub mod input;
pub mod ocr;
pub mod postprocess;
