//! Article sources.
//!
//! Each source turns a day (plus optional filters) into a stream of raw
//! records that [`crate::models::Article`] knows how to normalize.
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | The Guardian | [`guardian`] | Content API `/search` | Requires API key; paginated |

pub mod guardian;
