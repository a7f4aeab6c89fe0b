//! Pipeline stages for catalog extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different rasterisation backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ llm ──▶ recover ──▶ normalize
//! (page/img) (VLM)   (JSON)      (typed records)
//! ```
//!
//! 1. [`source`]    — stream units (pages or images) lazily, in order; runs
//!    pdfium work in `spawn_blocking` because it is not async-safe
//! 2. [`encode`]    — bounded-resolution JPEG re-encode + base64 wrap, done
//!    lazily only when a unit actually needs the vision fallback
//! 3. [`llm`]       — drive the text → vision fallback with retry/backoff;
//!    the only stage with network I/O
//! 4. [`recover`]   — tolerant JSON recovery from free-form model output
//! 5. [`normalize`] — coerce raw candidate dicts into validated records

pub mod encode;
pub mod llm;
pub mod normalize;
pub mod recover;
pub mod source;
