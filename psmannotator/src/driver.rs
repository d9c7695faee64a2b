use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};

use thiserror::Error;

use tracing::{debug, info, warn};

use mzdata::io::{infer_format, mgf::MGFReaderType, MassSpectrometryFormat, RestartableGzDecoder};
use mzdata::prelude::*;

use psmannotate::{AnnotationError, ModificationRegistry, SpectrumAnnotator};

use crate::args::{make_default_annotation_params, non_negative_float, ToleranceUnit};
use crate::mzspeclib::MzSpecLibWriter;
use crate::pdv::PDVWriter;
use crate::proc::prepare_processing;
use crate::progress::ProgressRecord;
use crate::types::{CPeak, DPeak, SpectrumType, BUFFER_SIZE};
use crate::write::{collate_results, write_output};

pub const LIBRARY_EXTENSION: &str = "mzlib.txt";

#[derive(Debug, Error)]
pub enum PSMAnnotatorError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("No MGF files were found in {0}")]
    NoInputFiles(String),
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
    #[error("Invalid annotation parameters: {0}")]
    AnnotationParamsError(
        #[source]
        #[from]
        AnnotationError,
    ),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

impl From<figment::Error> for PSMAnnotatorError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigurationError(value.to_string())
    }
}

/// One input MGF file and where its outputs go
#[derive(Debug, Clone, PartialEq)]
pub struct FileTask {
    pub input: PathBuf,
    pub library: PathBuf,
    /// The directory receiving the PDV side files
    pub side_directory: PathBuf,
    /// The input's file name with the MGF extension removed
    pub name: String,
}

impl FileTask {
    pub fn new(input: PathBuf, library: PathBuf) -> Self {
        let name = library_name(&input);
        let side_directory = match library.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            input,
            library,
            side_directory,
            name,
        }
    }

    pub fn pdv_mgf_path(&self) -> PathBuf {
        self.side_directory.join(format!("PDV_{}.mgf", self.name))
    }

    pub fn pdv_table_path(&self) -> PathBuf {
        self.side_directory.join(format!("PDV_{}.tsv", self.name))
    }
}

fn is_mgf(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".mgf") || name.ends_with(".mgf.gz")
}

/// The file name of `path` without its `.mgf` or `.mgf.gz` extension
pub fn library_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_lowercase();
    for ext in [".mgf.gz", ".mgf"] {
        if lower.ends_with(ext) {
            return name[..name.len() - ext.len()].to_string();
        }
    }
    name
}

/// Build annotated mzSpecLib spectral libraries from peptide-identified MGF files.
///
/// Each spectrum's `SEQ` entry names the peptide it was identified as, with mass
/// shifts written inline like `-17.027SGLQENAFVNMKPSQILQ+0.984TVK`. Every peak is
/// labeled with the b or y fragment ion explaining it, if any.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[serde(default)]
#[command(author, version)]
pub struct PSMAnnotator {
    /// The MGF file to read, or a directory whose MGF files are all read
    #[arg()]
    pub input: PathBuf,

    /// The library file to write, or the directory to write libraries into when
    /// `input` is a directory
    #[arg()]
    pub output: PathBuf,

    /// The fragment ion m/z error tolerance
    #[arg(
        short = 't',
        long = "fragment-tolerance",
        default_value_t = 0.05,
        value_parser = non_negative_float
    )]
    pub fragment_tolerance: f64,

    /// The unit of the fragment ion m/z error tolerance
    #[arg(short = 'u', long = "tolerance-unit", default_value = "da")]
    pub tolerance_unit: ToleranceUnit,

    /// Do not consider water and ammonia losses
    #[arg(long = "no-neutral-losses")]
    pub no_neutral_losses: bool,

    /// Drop matches to peaks less intense than this fraction of the base peak
    #[arg(
        short = 'c',
        long = "intensity-cutoff",
        default_value_t = 0.01,
        value_parser = non_negative_float
    )]
    pub intensity_cutoff: f64,

    /// Do not write the PDV viewer side files
    #[arg(long = "no-pdv")]
    pub no_pdv: bool,

    /// The fragment ion types to annotate
    #[arg(
        short = 'i',
        long = "ion-types",
        value_delimiter = ',',
        default_value = "b,y"
    )]
    pub ion_types: Vec<String>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='T',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `psmannotator.toml` in the working directory.
    /// Environment variables prefixed with `PSMANNOTATOR_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The size of the buffers queueing annotated spectra for collation and writing
    #[arg(short = 'w', long="write-buffer-size", default_value_t=BUFFER_SIZE)]
    pub write_buffer_size: usize,
}

impl Default for PSMAnnotator {
    fn default() -> Self {
        let params = make_default_annotation_params();
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            fragment_tolerance: 0.05,
            tolerance_unit: ToleranceUnit::Da,
            no_neutral_losses: !params.neutral_losses,
            intensity_cutoff: params.intensity_cutoff,
            no_pdv: false,
            ion_types: params.ion_families.iter().map(|f| f.to_string()).collect(),
            threads: -1,
            log_file: None,
            config_file: None,
            write_buffer_size: BUFFER_SIZE,
        }
    }
}

impl PSMAnnotator {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, PSMAnnotatorError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(pool)
    }

    /// Translate the configuration into [`psmannotate::AnnotationParams`], failing
    /// on any ion type other than b or y.
    pub fn annotation_params(&self) -> Result<psmannotate::AnnotationParams, PSMAnnotatorError> {
        let mut params = make_default_annotation_params().with_ion_types(&self.ion_types)?;
        params.fragment_tolerance = self.tolerance_unit.tolerance(self.fragment_tolerance);
        params.neutral_losses = !self.no_neutral_losses;
        params.intensity_cutoff = self.intensity_cutoff;
        Ok(params)
    }

    /// List the files to process and where each one's library goes
    pub fn plan_tasks(&self) -> Result<Vec<FileTask>, PSMAnnotatorError> {
        if self.input.is_dir() {
            fs::create_dir_all(&self.output)?;
            let mut inputs: Vec<PathBuf> = fs::read_dir(&self.input)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<_>>>()?
                .into_iter()
                .filter(|p| p.is_file() && is_mgf(p))
                .collect();
            inputs.sort();
            if inputs.is_empty() {
                return Err(PSMAnnotatorError::NoInputFiles(
                    self.input.display().to_string(),
                ));
            }
            Ok(inputs
                .into_iter()
                .map(|input| {
                    let library = self
                        .output
                        .join(format!("{}.{LIBRARY_EXTENSION}", library_name(&input)));
                    FileTask::new(input, library)
                })
                .collect())
        } else {
            Ok(vec![FileTask::new(self.input.clone(), self.output.clone())])
        }
    }

    pub fn main(&self) -> Result<(), PSMAnnotatorError> {
        info!(
            "psmannotator v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        if tracing::enabled!(tracing::Level::DEBUG) {
            match toml::to_string_pretty(self) {
                Ok(text) => debug!("Configuration:\n{text}"),
                Err(e) => warn!("Failed to render the configuration: {e}"),
            }
        }
        let params = self.annotation_params()?;
        debug!("Annotation parameters: {params:?}");
        let annotator = SpectrumAnnotator::new(params, Arc::new(ModificationRegistry::new()));
        let pool = Arc::new(self.create_threadpool()?);
        let tasks = self.plan_tasks()?;
        let start = Instant::now();
        let mut total = ProgressRecord::default();
        for task in tasks.iter() {
            total += self.reader_then(task, &annotator, pool.clone())?;
        }
        if tasks.len() > 1 {
            info!(
                "Processed {} files | Spectra annotated: {} | Spectra failed: {} in {:0.3?}",
                tasks.len(),
                total.spectra_annotated,
                total.spectra_failed,
                Instant::now() - start
            );
        }
        debug!(
            "{} distinct modifications seen: {:?}",
            annotator.registry().len(),
            annotator.registry().names()
        );
        Ok(())
    }

    fn reader_then(
        &self,
        task: &FileTask,
        annotator: &SpectrumAnnotator,
        pool: Arc<rayon::ThreadPool>,
    ) -> Result<ProgressRecord, PSMAnnotatorError> {
        info!("Reading {}", task.input.display());
        let (ms_format, compressed) = infer_format(&task.input)?;
        debug!("Detected {ms_format:?} from path (compressed? {compressed})");
        match ms_format {
            MassSpectrometryFormat::MGF => {
                if compressed {
                    let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(
                        &task.input,
                    )?));
                    let reader = MGFReaderType::<_, CPeak, DPeak>::new(fh);
                    self.writer_then(task, reader, annotator, pool)
                } else {
                    let reader =
                        MGFReaderType::<_, CPeak, DPeak>::open_path(task.input.clone())?;
                    self.writer_then(task, reader, annotator, pool)
                }
            }
            _ => Err(PSMAnnotatorError::FormatUnknownOrNotSupportedError(
                task.input.display().to_string(),
                ms_format,
            )),
        }
    }

    fn writer_then<R: Iterator<Item = SpectrumType> + Send + 'static>(
        &self,
        task: &FileTask,
        reader: R,
        annotator: &SpectrumAnnotator,
        pool: Arc<rayon::ThreadPool>,
    ) -> Result<ProgressRecord, PSMAnnotatorError> {
        let handle = io::BufWriter::new(fs::File::create(&task.library)?);
        let library = MzSpecLibWriter::new(handle, task.name.clone())?;
        let pdv = if self.no_pdv {
            None
        } else {
            debug!("Writing PDV files to {}", task.side_directory.display());
            let mgf = io::BufWriter::new(fs::File::create(task.pdv_mgf_path())?);
            let table = io::BufWriter::new(fs::File::create(task.pdv_table_path())?);
            Some(PDVWriter::new(mgf, table)?)
        };
        let prog = self.run_workflow(reader, library, pdv, annotator.clone(), pool)?;
        Ok(prog)
    }

    fn run_workflow<
        R: Iterator<Item = SpectrumType> + Send + 'static,
        W: io::Write + Send + 'static,
        M: io::Write + Send + 'static,
        T: io::Write + Send + 'static,
    >(
        &self,
        reader: R,
        library: MzSpecLibWriter<W>,
        pdv: Option<PDVWriter<M, T>>,
        annotator: SpectrumAnnotator,
        pool: Arc<rayon::ThreadPool>,
    ) -> io::Result<ProgressRecord> {
        let buffer_size = self.write_buffer_size;
        let (send_solved, recv_solved) = crossbeam_channel::bounded(buffer_size);
        let (send_collated, recv_collated) = crossbeam_channel::bounded(buffer_size);

        let start = Instant::now();
        let read_task = thread::spawn(move || {
            pool.install(|| prepare_processing(reader, &annotator, send_solved))
        });

        let collate_task = thread::spawn(move || collate_results(recv_solved, send_collated));

        let write_task = thread::spawn(move || write_output(library, pdv, recv_collated));

        let mut prog = ProgressRecord::default();
        match read_task.join() {
            Ok(o) => {
                prog = o?;
                info!("Spectra read: {}", prog.spectra_read);
                info!(
                    "Spectra annotated: {} | Spectra failed: {}",
                    prog.spectra_annotated, prog.spectra_failed
                );
                info!("Spectra without matches: {}", prog.spectra_without_matches);
                info!(
                    "Matched peaks: {} | Unmatched peaks: {}",
                    prog.matched_peaks, prog.unmatched_peaks
                );
            }
            Err(e) => {
                warn!("Failed to join reader task: {e:?}");
            }
        }
        let read_done = Instant::now();
        let processing_elapsed = read_done - start;

        match collate_task.join() {
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to join collator task: {e:?}")
            }
        }

        match write_task.join() {
            Ok(o) => {
                let written = o?;
                info!("Spectra written: {written}");
            }
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
            }
        }

        let done = Instant::now();
        let elapsed = done - start;
        if (elapsed.as_secs_f64() - processing_elapsed.as_secs_f64()) > 2.0 {
            info!("Total Elapsed Time: {:0.3?}", elapsed);
        }
        Ok(prog)
    }
}

#[cfg(test)]
mod test {
    use psmannotate::{IonFamily, Tolerance};

    use super::*;

    #[test]
    fn test_library_name() {
        assert_eq!(library_name(Path::new("data/run_01.mgf")), "run_01");
        assert_eq!(library_name(Path::new("run_01.MGF")), "run_01");
        assert_eq!(library_name(Path::new("run.01.mgf.gz")), "run.01");
        assert!(is_mgf(Path::new("a/b.mgf")));
        assert!(!is_mgf(Path::new("a/b.mzML")));
    }

    #[test]
    fn test_file_task() {
        let task = FileTask::new("in/run.mgf".into(), "out/run.mzlib.txt".into());
        assert_eq!(task.name, "run");
        assert_eq!(task.pdv_mgf_path(), PathBuf::from("out/PDV_run.mgf"));
        assert_eq!(task.pdv_table_path(), PathBuf::from("out/PDV_run.tsv"));

        let task = FileTask::new("run.mgf".into(), "run.mzlib.txt".into());
        assert_eq!(task.side_directory, PathBuf::from("."));
    }

    #[test]
    fn test_annotation_params() {
        let args = PSMAnnotator::parse_from([
            "psmannotator",
            "in.mgf",
            "out.mzlib.txt",
            "-t",
            "20",
            "-u",
            "ppm",
            "--no-neutral-losses",
            "-i",
            "y",
        ]);
        let params = args.annotation_params().unwrap();
        assert_eq!(params.fragment_tolerance, Tolerance::PPM(20.0));
        assert!(!params.neutral_losses);
        assert_eq!(params.ion_families, vec![IonFamily::Y]);
        assert_eq!(params.intensity_cutoff, 0.01);

        let args = PSMAnnotator::parse_from(["psmannotator", "in.mgf", "out", "-i", "b,c"]);
        assert!(matches!(
            args.annotation_params(),
            Err(PSMAnnotatorError::AnnotationParamsError(AnnotationError::UnsupportedIonType(_)))
        ));
    }

    #[test]
    fn test_defaults_agree() {
        let parsed = PSMAnnotator::parse_from(["psmannotator", "in.mgf", "out"]);
        let default = PSMAnnotator::default();
        assert_eq!(parsed.fragment_tolerance, default.fragment_tolerance);
        assert_eq!(parsed.intensity_cutoff, default.intensity_cutoff);
        assert_eq!(parsed.ion_types, default.ion_types);
        assert_eq!(parsed.tolerance_unit, default.tolerance_unit);
        assert_eq!(parsed.no_pdv, default.no_pdv);
    }
}
