use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use gtfs_filter_core::gtfs_model::GtfsFile;
use gtfs_filter_core::{list_ids, run_filter, FilterRequest, FilterSummary, FilterType};

#[derive(Debug, Parser)]
#[command(name = "gtfs-filter")]
#[command(about = "Cut a GTFS feed down to a set of routes or trips")]
struct Args {
    /// Print debug logs, including the row count kept at each cascade step
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the subset of INPUT reachable from VALUES to OUTPUT
    Filter {
        /// Replace OUTPUT if it already exists
        #[arg(short = 'o', long = "overwrite")]
        overwrite: bool,

        #[arg(
            short = 't',
            long = "filter-type",
            alias = "filter_type",
            default_value_t = FilterType::RouteId
        )]
        filter_type: FilterType,

        /// Feed directory or zip archive
        input: PathBuf,

        /// Output directory, or a zip archive when the path ends in .zip
        output: PathBuf,

        #[arg(required = true)]
        values: Vec<String>,

        /// Write a JSON summary of row counts per file
        #[arg(long = "summary")]
        summary: Option<PathBuf>,

        #[arg(short = 'p', long = "pretty")]
        pretty: bool,
    },
    /// List the route or trip ids of a feed, sorted
    Ids {
        #[arg(
            short = 't',
            long = "filter-type",
            alias = "filter_type",
            default_value_t = FilterType::RouteId
        )]
        filter_type: FilterType,

        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Filter {
            overwrite,
            filter_type,
            input,
            output,
            values,
            summary,
            pretty,
        } => {
            let request = FilterRequest {
                input,
                output,
                filter_type,
                values,
                overwrite,
            };
            let started = Instant::now();
            let progress = IndicatifHandler::new();
            let result = run_filter(&request, Some(&progress));
            progress.finish();
            let outcome = result?;

            log_summary(&outcome.summary);
            info!(
                "wrote {} in {:.2?}",
                request.output.display(),
                started.elapsed()
            );

            if let Some(path) = summary {
                let json = outcome
                    .summary
                    .to_json(pretty)
                    .context("serializing summary")?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing summary {}", path.display()))?;
            }
        }
        Command::Ids { filter_type, input } => {
            for id in list_ids(&input, filter_type)? {
                println!("{}", id);
            }
        }
    }

    Ok(())
}

fn log_summary(summary: &FilterSummary) {
    for file in [
        GtfsFile::Routes,
        GtfsFile::Trips,
        GtfsFile::StopTimes,
        GtfsFile::Stops,
    ] {
        if let Some(table) = summary.table(file) {
            if table.status.is_loaded() {
                info!(
                    "{}: kept {} of {} rows",
                    table.file, table.rows_after, table.rows_before
                );
            }
        }
    }
}

use gtfs_filter_core::ProgressHandler;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

struct IndicatifHandler {
    _multi: MultiProgress,
    loading_pb: ProgressBar,
    saving_pb: ProgressBar,
}

impl IndicatifHandler {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let loading_pb = multi.add(ProgressBar::new(0));
        loading_pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        loading_pb.set_message("Waiting to load files...");

        let saving_pb = multi.add(ProgressBar::new_spinner());
        saving_pb.set_style(
            ProgressStyle::with_template("{spinner:.magenta} [{elapsed_precise}] {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        saving_pb.set_message("waiting to save");

        Self {
            _multi: multi,
            loading_pb,
            saving_pb,
        }
    }

    fn finish(&self) {
        self.loading_pb.finish_with_message("Loading complete");
        self.saving_pb.finish_with_message("saved");
    }
}

impl ProgressHandler for IndicatifHandler {
    fn set_total_files(&self, count: usize) {
        self.loading_pb.set_length(count as u64);
        self.loading_pb.set_message("Starting load...");
    }

    fn on_start_file_load(&self, file: &str) {
        self.loading_pb.set_message(format!("Loading {}", file));
    }

    fn on_finish_file_load(&self, _file: &str) {
        self.loading_pb.inc(1);
    }

    fn on_start_file_save(&self, file: &str) {
        self.saving_pb.set_message(format!("writing {}", file));
    }

    fn on_finish_file_save(&self, _file: &str) {
        self.saving_pb.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn filter_defaults_to_route_ids() {
        let args = Args::try_parse_from(["gtfs-filter", "filter", "in", "out", "R1", "R2"])
            .expect("parse");
        match args.command {
            Command::Filter {
                filter_type,
                values,
                overwrite,
                ..
            } => {
                assert_eq!(filter_type, FilterType::RouteId);
                assert_eq!(values, vec!["R1", "R2"]);
                assert!(!overwrite);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn filter_requires_at_least_one_value() {
        assert!(Args::try_parse_from(["gtfs-filter", "filter", "in", "out"]).is_err());
    }

    #[test]
    fn rejects_unknown_filter_type() {
        let err = Args::try_parse_from([
            "gtfs-filter",
            "filter",
            "-t",
            "stop_id",
            "in",
            "out",
            "S1",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Invalid filter type stop_id."));
    }

    #[test]
    fn parses_trip_filter_with_overwrite() {
        let args = Args::try_parse_from([
            "gtfs-filter",
            "-v",
            "filter",
            "-o",
            "--filter-type",
            "trip_id",
            "feed.zip",
            "out.zip",
            "T1",
        ])
        .expect("parse");
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Filter {
                filter_type: FilterType::TripId,
                overwrite: true,
                ..
            }
        ));
    }
}
