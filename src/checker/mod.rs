// src/checker/mod.rs
// =============================================================================
// This module contains all URL checking logic.
//
// Submodules:
// - validate: decides whether a string is a URL we are willing to request
// - http:     makes the request, classifies the result, records it
//
// This file (mod.rs) is the module root - it re-exports the public API so the
// rest of the application can write `checker::Checker`.
// =============================================================================

mod http;
mod validate;

pub use http::Checker;
