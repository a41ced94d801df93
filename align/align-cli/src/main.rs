//! Elastic multi-layer alignment from the command line.
//!
//! Reads tile-spec and correspondence JSON files, solves the elastic
//! alignment, and writes one updated tile-spec file per layer into the
//! target directory, preserving input basenames.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use align_elastic::{
    align_layers, AlignInputs, AlignOutput, AlignParams, CorrespondenceIndex, ElasticError,
    LayerSet,
};
use align_models::ModelKind;
use align_spec::{expand_file_args, parse_layer_range, write_tile_specs, SpecError};
use clap::Parser;
use tracing::info;

/// Optimize the elastic alignment of a layer stack.
#[derive(Parser, Debug)]
#[command(name = "optimize-layers", version)]
#[command(about = "Elastic multi-layer alignment of tiled image stacks")]
struct Cli {
    /// Correspondence json files, or a single file listing one per line
    #[arg(long = "corrFiles", num_args = 1.., required = true)]
    corr_files: Vec<String>,

    /// Tilespec json files, or a single file listing one per line
    #[arg(long = "tilespecFiles", num_args = 1.., required = true)]
    tilespec_files: Vec<String>,

    /// Fixed layer numbers
    #[arg(long = "fixedLayers", num_args = 1.., required = true)]
    fixed_layers: Vec<i64>,

    /// Width of the entire image (all layers), for consistent meshes
    #[arg(long = "imageWidth")]
    image_width: f64,

    /// Height of the entire image (all layers), for consistent meshes
    #[arg(long = "imageHeight")]
    image_height: f64,

    /// Directory for the output tilespec files
    #[arg(long = "targetDir")]
    target_dir: PathBuf,

    /// Model: 0=Translation, 1=Rigid, 2=Similarity, 3=Affine, 4=Homography
    #[arg(long = "modelIndex", default_value_t = 1)]
    model_index: usize,

    /// Layer scale
    #[arg(long = "layerScale", default_value_t = 0.1)]
    layer_scale: f64,

    /// Spring mesh lattice columns
    #[arg(long = "resolutionSpringMesh", default_value_t = 32)]
    resolution_spring_mesh: usize,

    /// Spring mesh stiffness
    #[arg(long = "stiffnessSpringMesh", default_value_t = 0.1)]
    stiffness_spring_mesh: f64,

    /// Spring mesh damping factor
    #[arg(long = "dampSpringMesh", default_value_t = 0.9)]
    damp_spring_mesh: f64,

    /// Spring stretch clip in pixels
    #[arg(long = "maxStretchSpringMesh", default_value_t = 2000.0)]
    max_stretch_spring_mesh: f64,

    /// Convergence threshold in pixels
    #[arg(long = "maxEpsilon", default_value_t = 200.0)]
    max_epsilon: f64,

    /// Iteration cap for the optimizers
    #[arg(long = "maxIterationsSpringMesh", default_value_t = 1000)]
    max_iterations_spring_mesh: usize,

    /// Plateau detection window
    #[arg(long = "maxPlateauwidthSpringMesh", default_value_t = 200)]
    max_plateau_width_spring_mesh: usize,

    /// Number of neighboring layers to match
    #[arg(long = "maxLayersDistance", default_value_t = 1)]
    max_layers_distance: i64,

    /// Use the historical fixed-count relaxation loop
    #[arg(long = "useLegacyOptimizer")]
    use_legacy_optimizer: bool,

    /// Worker threads (default: host CPU count)
    #[arg(long = "threads")]
    threads: Option<usize>,

    /// First layer to optimize (default: first layer in the tilespecs)
    #[arg(long = "fromLayer")]
    from_layer: Option<i64>,

    /// Last layer to optimize (default: last layer in the tilespecs)
    #[arg(long = "toLayer")]
    to_layer: Option<i64>,

    /// Layer ranges to skip, e.g. "3,5-7,12"
    #[arg(long = "skipLayers", default_value = "")]
    skip_layers: String,
}

fn run(cli: &Cli) -> Result<AlignOutput, ElasticError> {
    #[allow(clippy::cast_precision_loss)]
    let model_index_value = cli.model_index as f64;
    let model = ModelKind::from_index(cli.model_index).ok_or(ElasticError::InvalidParameter {
        name: "model_index",
        value: model_index_value,
    })?;

    let skipped: BTreeSet<i64> = parse_layer_range(&cli.skip_layers)?;
    let tilespec_files = expand_file_args(&cli.tilespec_files)?;
    let corr_files = expand_file_args(&cli.corr_files)?;

    let layers = LayerSet::load(&tilespec_files, &skipped)?;
    let correspondences = CorrespondenceIndex::load(&corr_files, &layers)?;

    let mut params = AlignParams::sized(cli.image_width, cli.image_height);
    params.model = model;
    params.layer_scale = cli.layer_scale;
    params.mesh_resolution = cli.resolution_spring_mesh;
    params.stiffness = cli.stiffness_spring_mesh;
    params.damp = cli.damp_spring_mesh;
    params.max_stretch = cli.max_stretch_spring_mesh;
    params.max_epsilon = cli.max_epsilon;
    params.max_iterations = cli.max_iterations_spring_mesh;
    params.max_plateau_width = cli.max_plateau_width_spring_mesh;
    params.use_legacy_optimizer = cli.use_legacy_optimizer;
    params.max_layer_distance = cli.max_layers_distance;

    let inputs = AlignInputs {
        layers,
        correspondences,
        fixed_layers: cli.fixed_layers.iter().copied().collect(),
        skipped_layers: skipped,
        from_layer: cli.from_layer,
        to_layer: cli.to_layer,
        cancel: None,
    };

    let output = align_layers(&params, &inputs)?;

    info!("optimization complete, writing tile transforms");
    std::fs::create_dir_all(&cli.target_dir).map_err(|source| {
        ElasticError::Spec(SpecError::Io {
            path: cli.target_dir.clone(),
            source,
        })
    })?;
    for (layer, tiles) in &output.layers {
        let target = cli.target_dir.join(&tiles.basename);
        info!(layer, path = %target.display(), "writing layer");
        write_tile_specs(&target, &tiles.tiles)?;
    }
    Ok(output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress goes to stdout at phase boundaries; errors go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .init();

    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            eprintln!("error[input-parse] cannot configure {threads} threads: {e}");
            return ExitCode::from(1);
        }
    }

    match run(&cli) {
        Ok(output) => {
            info!(
                layers = output.report.layers_emitted,
                dropped_matches = output.report.dropped_matches,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error[{}] {e}", e.kind());
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
