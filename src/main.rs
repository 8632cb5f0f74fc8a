use std::process;

use clap::Parser;

use csv_to_shp::{init_tracing, Cli};

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let converter = cli.to_converter().unwrap_or_else(|err| {
        eprintln!("An error occurred while preparing the output files: {}", err);
        process::exit(1);
    });

    converter.convert().unwrap_or_else(|err| {
        eprintln!("An error occurred while converting {}: {}", cli.input.display(), err);
        process::exit(1);
    });
}
