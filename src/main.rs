use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use svo::{Assembly, Mesh, MeshingSettings, Octree, SdfGrid};
use tracing::info;

#[derive(Parser)]
#[command(name = "dust-mesher")]
#[command(about = "Converts sparse signed distance octrees into triangle meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the iso surface of an octree into an OBJ file
    Extract {
        /// Octree file to read
        octree: PathBuf,
        /// Output path. Defaults to the input path with an `obj` extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Field value of the extracted surface
        #[arg(long, env = "DUST_MESHER_ISO", default_value_t = 0.0, allow_negative_numbers = true)]
        iso: f32,
        /// Worker threads. Defaults to the available parallelism
        #[arg(long, env = "DUST_MESHER_WORKERS")]
        workers: Option<NonZeroUsize>,
        /// Share vertices between triangles. Triangulation then runs on a single thread
        #[arg(long, env = "DUST_MESHER_DEDUP")]
        dedup: bool,
    },
    /// Print every node of an octree
    Dump {
        octree: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write an octree sampled from a sphere centered at the origin
    Sphere {
        output: PathBuf,
        #[arg(long, default_value_t = 0.5)]
        radius: f32,
        /// Maximum subdivision depth
        #[arg(long, default_value_t = 5)]
        depth: u8,
    },
    /// Convert a dense distance grid into an octree
    Grid {
        grid: PathBuf,
        output: PathBuf,
        /// Maximum subdivision depth
        #[arg(long, default_value_t = 6)]
        depth: u8,
    },
}

fn extract(input: &Path, output: &Path, settings: &MeshingSettings) -> Result<Mesh> {
    let octree = Octree::load(input)
        .with_context(|| format!("failed to load octree {}", input.display()))?;
    let meshes = svo::extract_meshes(&octree, settings).context("failed to extract surface")?;
    let mesh = Mesh::concat(meshes);
    mesh.save_obj(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        triangles = mesh.triangle_count(),
        vertices = mesh.vertices().len(),
        output = %output.display(),
        "done"
    );
    Ok(mesh)
}

fn dump(input: &Path, output: Option<&Path>) -> Result<()> {
    let octree = Octree::load(input)
        .with_context(|| format!("failed to load octree {}", input.display()))?;
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(
                File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
            );
            octree.write_text_dump(&mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            octree.write_text_dump(&mut writer)?;
        }
    }
    Ok(())
}

fn sphere(output: &Path, radius: f32, depth: u8) -> Result<Octree> {
    let octree = Octree::from_field(&|p: Vec3| p.length() - radius, depth);
    octree
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(octree)
}

fn grid(input: &Path, output: &Path, depth: u8) -> Result<Octree> {
    let grid =
        SdfGrid::load(input).with_context(|| format!("failed to load grid {}", input.display()))?;
    let octree = Octree::from_field(&grid, depth);
    octree
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(octree)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            octree,
            output,
            iso,
            workers,
            dedup,
        } => {
            let mut settings = MeshingSettings::default().with_iso_level(iso);
            if let Some(workers) = workers {
                settings = settings.with_workers(workers);
            }
            if dedup {
                settings = settings.with_assembly(Assembly::Deduplicated);
            }
            let output = output.unwrap_or_else(|| octree.with_extension("obj"));
            extract(&octree, &output, &settings)?;
        }
        Commands::Dump { octree, output } => dump(&octree, output.as_deref())?,
        Commands::Sphere {
            output,
            radius,
            depth,
        } => {
            sphere(&output, radius, depth)?;
        }
        Commands::Grid {
            grid: input,
            output,
            depth,
        } => {
            grid(&input, &output, depth)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dust_log::init();
    run(Cli::parse())
}
