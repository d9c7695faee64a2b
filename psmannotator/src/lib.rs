mod args;
mod driver;
mod mzspeclib;
mod pdv;
mod proc;
mod progress;
mod reader;
mod types;
mod write;

pub use args::*;
pub use driver::{library_name, FileTask, PSMAnnotator, PSMAnnotatorError, LIBRARY_EXTENSION};
pub use mzspeclib::MzSpecLibWriter;
pub use pdv::PDVWriter;
pub use progress::ProgressRecord;
pub use reader::{spectrum_record, RecordError};
