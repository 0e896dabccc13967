//! LODES download CLI.
//!
//! Downloads WAC/RAC/OD data for a set of areas, aggregates it to the
//! requested geography and writes the result as CSV.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lodes::{GeographyLevel, JobType, LodesClient, LodesTable, Segment};

#[derive(Parser, Debug)]
#[command(name = "lodes")]
#[command(about = "Download, filter and aggregate LEHD LODES commuting data")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Write CSV output here instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Workplace Area Characteristics (jobs by workplace block)
    Wac {
        /// Workplace GEOIDs of any granularity, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        locations: Vec<String>,

        #[arg(long, default_value = "2016")]
        year: u16,

        /// Output geography: B, BG, CT, C or S
        #[arg(long, default_value = "B")]
        geography: String,

        /// Workforce segment code (S000, SA01, ...)
        #[arg(long, default_value = "S000")]
        segment: String,

        /// Job type code (JT00 through JT05)
        #[arg(long, default_value = "JT00")]
        job_type: String,
    },

    /// Residence Area Characteristics (jobs by home block)
    Rac {
        /// Home GEOIDs of any granularity, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        locations: Vec<String>,

        #[arg(long, default_value = "2016")]
        year: u16,

        #[arg(long, default_value = "B")]
        geography: String,

        #[arg(long, default_value = "S000")]
        segment: String,

        #[arg(long, default_value = "JT00")]
        job_type: String,
    },

    /// Origin-destination commuting flows
    Od {
        /// Origin GEOIDs, comma separated
        #[arg(long, value_delimiter = ',')]
        origins: Option<Vec<String>>,

        /// Destination GEOIDs, comma separated
        #[arg(long, value_delimiter = ',')]
        destinations: Option<Vec<String>>,

        #[arg(long, default_value = "2016")]
        year: u16,

        #[arg(long, default_value = "B")]
        geography: String,

        #[arg(long, default_value = "JT00")]
        job_type: String,

        /// Keep only flows with both endpoints inside the given areas
        #[arg(long)]
        constrained: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let client = LodesClient::new();

    let table = match &args.command {
        Command::Wac {
            locations,
            year,
            geography,
            segment,
            job_type,
        } => {
            client
                .wac(
                    locations,
                    *year,
                    geography.parse::<GeographyLevel>()?,
                    segment.parse::<Segment>()?,
                    job_type.parse::<JobType>()?,
                )
                .await?
        }
        Command::Rac {
            locations,
            year,
            geography,
            segment,
            job_type,
        } => {
            client
                .rac(
                    locations,
                    *year,
                    geography.parse::<GeographyLevel>()?,
                    segment.parse::<Segment>()?,
                    job_type.parse::<JobType>()?,
                )
                .await?
        }
        Command::Od {
            origins,
            destinations,
            year,
            geography,
            job_type,
            constrained,
        } => {
            client
                .od(
                    *year,
                    geography.parse::<GeographyLevel>()?,
                    job_type.parse::<JobType>()?,
                    origins.as_deref(),
                    destinations.as_deref(),
                    *constrained,
                )
                .await?
        }
    };

    info!("writing {} rows", table.len());
    write_output(&table, args.output.as_deref())?;

    Ok(())
}

fn write_output(table: &LodesTable, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(file)?;
            info!("wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            table.write_csv(&mut handle)?;
            handle.flush()?;
        }
    }
    Ok(())
}
