//! Extraction adapters for catalog import.
//!
//! The import pipeline in `winquote-core` only knows the `CatalogExtractor`
//! trait. This crate provides the HTTP implementation that sends a PDF to a
//! Gemini `generateContent` endpoint and asks for rows matching the import
//! schema.
//!
//! The model is strictly a reader. It never decides prices or merge targets;
//! those are computed deterministically from the rows it returns.

pub mod gemini;

pub use gemini::GeminiCatalogExtractor;
