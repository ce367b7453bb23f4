use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// Directory containing the input text files.
    ///
    /// One word-count file per input file is written to the
    /// `final_output` directory, together with a `SUCCESS.ind` marker
    /// on full success.
    #[clap(value_parser)]
    pub(crate) input_directory: PathBuf,
}
