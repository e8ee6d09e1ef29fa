//! Output generation.
//!
//! # Submodules
//!
//! - [`jsonl`]: writes analyses and failure records as newline-delimited JSON
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── guardian_analysis_2025-05-06.jsonl           # always written
//! └── guardian_analysis_2025-05-06_failures.jsonl  # only when something failed
//! ```

pub mod jsonl;
