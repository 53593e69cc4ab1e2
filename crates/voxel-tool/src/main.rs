//! Command-line voxelizer and inspector for voxel tree files.
//!
//! `voxelize` turns a Wavefront OBJ mesh (or a built-in cube) into a voxel
//! tree, optionally classifies its voxels as inside, outside or boundary
//! and writes the encoded tree to a file. `info` reads a file back and
//! prints statistics about it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use nalgebra::Point3;
use voxel_tree::codec::{deserialize_hierarchy, serialize_hierarchy};
use voxel_tree::geometry::{Mesh, Range3};
use voxel_tree::processor::{IobEvalProcessor, VoxelizationTarget};
use voxel_tree::query::classify_iob;
use voxel_tree::{voxelize_mesh, Context, ContextConfig, Separability, VoxelClass, VoxelTree};

#[derive(Parser, Debug)]
#[command(name = "voxel-tool")]
#[command(about = "Voxelizes meshes into hierarchical voxel trees and inspects the results")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Voxelize a mesh and write the tree.
    Voxelize(VoxelizeArgs),
    /// Print statistics about a stored tree.
    Info {
        file: PathBuf,

        /// Also print the node hierarchy.
        #[arg(long)]
        dump: bool,
    },
}

#[derive(clap::Args, Debug)]
struct VoxelizeArgs {
    /// Wavefront OBJ file to voxelize.
    #[arg(long, conflicts_with = "cube")]
    mesh: Option<PathBuf>,

    /// Voxelize a cube instead of a mesh file (the default).
    #[arg(long)]
    cube: bool,

    /// Number of tree levels. Overrides the configuration file.
    #[arg(long)]
    levels: Option<usize>,

    /// Voxelization depth (default: the deepest level).
    #[arg(long)]
    depth: Option<usize>,

    /// Separability of the voxelized surface.
    #[arg(long, value_enum, default_value_t = Sep::TwentySix)]
    sep: Sep,

    /// JSON file with the context parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Classify the voxels as inside, outside or boundary.
    #[arg(long)]
    classify: bool,

    /// Output file.
    #[arg(long)]
    out: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Sep {
    #[value(name = "6")]
    Six,
    #[value(name = "26")]
    TwentySix,
}

impl From<Sep> for Separability {
    fn from(sep: Sep) -> Self {
        match sep {
            Sep::Six => Separability::Six,
            Sep::TwentySix => Separability::TwentySix,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Command::Voxelize(v) => voxelize(&v),
        Command::Info { file, dump } => print_info(&file, dump),
    }
}

fn load_config(args: &VoxelizeArgs) -> Result<ContextConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("invalid context configuration {}", path.display()))?
        }
        None => ContextConfig::default(),
    };
    if let Some(levels) = args.levels {
        config.max_num_levels = levels;
    }
    Ok(config)
}

fn load_mesh(args: &VoxelizeArgs, context: &Context) -> Result<Mesh> {
    let margin = Context::DEFAULT_BOX_INSET * context.scale();
    let target = Range3::new(
        Point3::new(margin, margin, margin),
        Point3::new(context.scale() - margin, context.scale() - margin, context.scale() - margin),
    );
    let mesh = match &args.mesh {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            let mesh = Mesh::from_obj_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
            info!("loaded {} faces from {}", mesh.len(), path.display());
            mesh
        }
        None => Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
    };
    match mesh.fitted(&target) {
        Some(mesh) => Ok(mesh),
        None => bail!("mesh has no extent"),
    }
}

fn voxelize(args: &VoxelizeArgs) -> Result<()> {
    let config = load_config(args)?;
    let context = Arc::new(Context::from_config(&config)?);
    if let Some(depth) = args.depth {
        if depth > context.max_depth() {
            bail!("depth {depth} exceeds the deepest level {}", context.max_depth());
        }
    }
    let mesh = load_mesh(args, &context)?;
    let depth = context.resolve_depth(args.depth);

    let mut tree = VoxelTree::new(context);
    let target = if args.classify {
        VoxelizationTarget::Class
    } else {
        VoxelizationTarget::ColorNormal
    };
    let voxels = voxelize_mesh(&mut tree, &mesh, args.sep.into(), Some(depth), target)?;
    info!("voxelized {} faces into {voxels} voxels at depth {depth}", mesh.len());

    if args.classify {
        let counts = classify_iob(&mut tree, depth, &IobEvalProcessor::default())?;
        info!(
            "classified {} inside, {} outside, {} boundary voxels",
            counts.inside, counts.outside, counts.boundary
        );
    }

    let bytes = serialize_hierarchy(&tree)?;
    fs::write(&args.out, &bytes).with_context(|| format!("failed to write {}", args.out.display()))?;
    info!("wrote {} nodes ({} bytes) to {}", tree.len(), bytes.len(), args.out.display());
    Ok(())
}

fn print_info(path: &Path, dump: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tree = deserialize_hierarchy(&bytes).with_context(|| format!("failed to decode {}", path.display()))?;
    let root = tree.root();

    println!("{}", serde_json::to_string_pretty(&tree.context().config())?);
    println!("nodes:        {}", tree.len());
    println!("leaves:       {}", tree.leaves(root).len());
    println!("max depth:    {}", tree.max_depth(root));
    println!("faces:        {}", tree.num_faces(root, true));
    println!("memory (est): {} bytes", tree.memory_size());

    let mut by_type = BTreeMap::new();
    let mut by_class = BTreeMap::new();
    for h in tree.descendants(root) {
        if let Some(t) = tree.node(h).and_then(|n| n.data_type()) {
            *by_type.entry(format!("{t:?}")).or_insert(0usize) += 1;
        }
        let class = tree.voxel_class(h);
        for (name, flag) in [
            ("inside", VoxelClass::INSIDE),
            ("outside", VoxelClass::OUTSIDE),
            ("boundary", VoxelClass::BOUNDARY),
            ("filled", VoxelClass::FILLED),
        ] {
            if class.contains(flag) {
                *by_class.entry(name).or_insert(0usize) += 1;
            }
        }
    }
    for (t, n) in &by_type {
        println!("data {t:<12} {n}");
    }
    for (c, n) in &by_class {
        println!("class {c:<11} {n}");
    }
    if dump {
        print!("{}", tree.to_text(root, true));
    }
    Ok(())
}
