//! Entry point for the ru-istp application.
//! Handles CLI parsing, logging setup, conversion, and dispatches inspection or export.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;
use ru_istp::{
    dataset_summary_json, describe_variable, list_dimensions_and_variables, open_dataset,
    print_dataset, NetCDFWriter,
};

/// Environment variable overriding the log filter, e.g. `RU_ISTP_LOG=ru_istp=debug`
const LOG_ENV: &str = "RU_ISTP_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.json {
        println!(
            r#"
------------------------------------------------------------------
                 ru-istp :: ISTP metadata to labeled data
------------------------------------------------------------------
"#
        );
    }

    let dataset = open_dataset(&args.file, &args.conversion_options())?;
    if !args.json {
        println!("Successfully converted: {}", args.file.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dataset_summary_json(&dataset))?);
    } else if let Some(var_name) = &args.describe {
        describe_variable(&dataset, var_name)?;
    } else if args.list_vars {
        list_dimensions_and_variables(&dataset);
    } else {
        print_dataset(&dataset);
    }

    if !args.json {
        dataset.diagnostics.print();
    }

    if let Some(output_path) = &args.output_netcdf {
        let skipped = NetCDFWriter::new(output_path).write_dataset(&dataset)?;
        skipped.print();
        println!("✅ Saved dataset to {}", output_path.display());
    }

    Ok(())
}
