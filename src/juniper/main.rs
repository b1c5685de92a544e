use anyhow::{Context, bail};
use clap::Parser;
use depiction_geo::config::GeoConfig;
use depiction_geo::georeference::{
    self, FlightCoverReferences, Reference, SubjectSource, assign_flight_cover_references,
    assign_references, recompile_subjects,
};
use depiction_geo::geotag::{GeotagFeature, add_geotag_depiction, remove_geotag_depiction};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Georeference and geotag maintenance for depictions", long_about = None)]
struct Args {
    #[command(flatten)]
    config: GeoConfig,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Assign labelled place references to one or more depictions
    Assign {
        #[arg(long = "depiction-id", required = true)]
        depiction_ids: Vec<i64>,
        /// label=id[,id...]. An empty id list removes the label.
        #[arg(long = "reference")]
        references: Vec<String>,
        /// JSON array of {label, ids, alt_label} objects. Use - for stdin.
        #[arg(long)]
        references_json: Option<PathBuf>,
    },
    /// Assign flight cover addresses and postmarks to a depiction
    FlightCover {
        #[arg(long = "depiction-id")]
        depiction_id: i64,
        #[arg(long, value_delimiter = ',')]
        from: Vec<i64>,
        #[arg(long, value_delimiter = ',')]
        to: Vec<i64>,
        #[arg(long, value_delimiter = ',')]
        sent: Vec<i64>,
        #[arg(long, value_delimiter = ',')]
        received: Vec<i64>,
    },
    /// Rebuild subjects from their depictions
    Recompile {
        #[arg(long = "subject-id", conflicts_with = "iterate")]
        subject_ids: Vec<i64>,
        /// Recompile every record under this directory
        #[arg(long)]
        iterate: Option<PathBuf>,
    },
    /// Geotag one or more depictions with a camera feature
    AddGeotag {
        #[arg(long = "depiction-id", required = true)]
        depiction_ids: Vec<i64>,
        /// GeoJSON camera feature with a Point and horizon LineString. Use - for stdin.
        #[arg(long, default_value = "-")]
        feature: PathBuf,
    },
    /// Remove geotagging from one or more depictions
    RemoveGeotag {
        #[arg(long = "depiction-id", required = true)]
        depiction_ids: Vec<i64>,
    },
}

/// A file's contents, or stdin for `-`.
async fn read_input(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

async fn read_references_json(path: &PathBuf) -> anyhow::Result<Vec<Reference>> {
    let body = read_input(path).await?;
    Ok(georeference::parse_references_json(&body)?)
}

fn print_bundle(bundle: &Value) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(bundle).context("Failed to encode feature collection")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = if args.config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.cmd {
        Command::Assign {
            depiction_ids,
            references,
            references_json,
        } => {
            let mut refs = references
                .iter()
                .map(|raw| georeference::parse_reference(raw))
                .collect::<Result<Vec<Reference>, _>>()
                .context("Failed to parse --reference")?;

            if let Some(path) = references_json {
                refs.extend(read_references_json(&path).await?);
            }

            let opts = args
                .config
                .assign_options()
                .context("Failed to set up stores")?;

            for id in depiction_ids {
                info!("Assign {} references to {}", refs.len(), id);

                let bundle = assign_references(&opts, id, &refs)
                    .await
                    .with_context(|| format!("Failed to assign references to {}", id))?;

                print_bundle(&bundle)?;
            }
        }
        Command::FlightCover {
            depiction_id,
            from,
            to,
            sent,
            received,
        } => {
            let opts = args
                .config
                .assign_options()
                .context("Failed to set up stores")?;

            let refs = FlightCoverReferences {
                id: depiction_id,
                from,
                to,
                sent,
                received,
            };

            let bundle = assign_flight_cover_references(&opts, &refs)
                .await
                .with_context(|| {
                    format!("Failed to assign flight cover references to {}", depiction_id)
                })?;

            print_bundle(&bundle)?;
        }
        Command::Recompile {
            subject_ids,
            iterate,
        } => {
            let source = match (iterate, subject_ids.is_empty()) {
                (Some(root), _) => SubjectSource::Directory(root),
                (None, false) => SubjectSource::Ids(subject_ids),
                (None, true) => bail!("Expected --subject-id or --iterate"),
            };

            let opts = args
                .config
                .recompile_subjects_options()
                .context("Failed to set up stores")?;

            let written = recompile_subjects(&opts, source)
                .await
                .context("Failed to recompile subjects")?;

            println!("{}", serde_json::to_string(&written)?);
        }
        Command::AddGeotag {
            depiction_ids,
            feature,
        } => {
            let body = read_input(&feature).await?;
            let feature = GeotagFeature::parse(&body).context("Failed to parse camera feature")?;
            feature.validate().context("Invalid camera feature")?;

            let opts = args
                .config
                .geotag_options()
                .context("Failed to set up stores")?;

            for id in depiction_ids {
                info!("Geotag {}", id);

                let bundle = add_geotag_depiction(&opts, id, &feature)
                    .await
                    .with_context(|| format!("Failed to geotag {}", id))?;

                print_bundle(&bundle)?;
            }
        }
        Command::RemoveGeotag { depiction_ids } => {
            let opts = args
                .config
                .geotag_options()
                .context("Failed to set up stores")?;

            for id in depiction_ids {
                let bundle = remove_geotag_depiction(&opts, id)
                    .await
                    .with_context(|| format!("Failed to remove geotag from {}", id))?;

                print_bundle(&bundle)?;
            }
        }
    }

    Ok(())
}
