//! Input Validation Module
//!
//! Sanitization and validation for contact submissions.
//!
//! # Overview
//!
//! 1. **Sanitizers** - ordered string pipelines that strip markup from the
//!    message and language fields
//! 2. **Validators** - email syntax and non-empty message checks
//!
//! Sanitization runs first; validation only ever sees sanitized values.
//! A message consisting solely of markup therefore fails as
//! `MALFORMED_MESSAGE`.

pub mod sanitizers;
pub mod validators;

pub use sanitizers::{
    auto_link, convert_line_breaks, escape_heart, restore_heart, strip_markup, truncate_smart,
    FieldSanitizer, Pipeline, SanitizeStep, SanitizerOptions,
};
pub use validators::{is_non_empty, is_valid_email, validate_submission, ValidationFailure};
