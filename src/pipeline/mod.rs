//! Pipeline stages for one analysis request.
//!
//! Each submodule implements exactly one step, and every external tool sits
//! behind a trait so tests can count and order the calls.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ extract ──────────────────────────▶ analysis
//! (upload)   ├─ render    (pdfium text / pages)   (AnalysisService)
//!            ├─ normalize (image → PNG)
//!            └─ ocr       (tesseract)
//!
//! scope: scratch dir + artifact registry + OCR session, released last
//! ```
//!
//! 1. [`intake`]: policy check, then persist the upload into the scope
//! 2. [`extract`]: choose text layer, PDF OCR or image OCR
//! 3. [`render`]: pdfium text layer and rasterisation (`spawn_blocking`)
//! 4. [`normalize`]: re-encode image uploads to PNG
//! 5. [`ocr`]: per-request tesseract sessions
//! 6. [`analysis`]: build the request, call the service under a deadline,
//!    validate the result
//! 7. [`scope`]: remove every registered file exactly once

pub mod analysis;
pub mod extract;
pub mod intake;
pub mod normalize;
pub mod ocr;
pub mod render;
pub mod scope;
