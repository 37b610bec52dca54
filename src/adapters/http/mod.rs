//! HTTP adapter - turns outcomes into responses.
//!
//! Routing lives with the API service; this module only supplies the
//! response mapping its handlers return.

mod envelope;
