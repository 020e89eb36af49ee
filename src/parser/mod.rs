//! Figure extraction from document markup.

mod extractor;

pub use extractor::FigureExtractor;
