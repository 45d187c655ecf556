//! Ovoid CLI - flow a closed mesh toward its best-fitting ellipsoid.
//!
//! Usage: ovoid [OPTIONS] <INPUT> <DT> <PASS_BAND> <MAX_ITER>
//!
//! Run `ovoid --help` for available options. Per-iteration progress is
//! logged at `info` level; set `RUST_LOG` to change the verbosity.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use ovoid::algo::clean::CleanOptions;
use ovoid::algo::smooth;
use ovoid::backend::NativeBackend;
use ovoid::io;
use ovoid::pipeline::{self, FileSink, FlowConfig, FlowController, FlowState};

#[derive(Parser)]
#[command(name = "ovoid")]
#[command(author, version, about = "Mean curvature flow toward the best-fitting ellipsoid", long_about = None)]
struct Cli {
    /// Input mesh file (.off, .vtk, .ply, .stl, .gltf, .glb)
    input: PathBuf,

    /// Implicit flow time step
    dt: f64,

    /// Smoothing pass band, in (0, 2]
    pass_band: f64,

    /// Iterations allowed before the run is reported as non-convergent
    max_iter: usize,

    /// Directory for per-iteration meshes and radii.txt
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Convergence threshold on the deviation statistic
    #[arg(short, long, default_value = "0.04")]
    threshold: f64,

    /// Quantile of vertex distances used as the deviation statistic
    #[arg(short, long, default_value = "0.95")]
    quantile: f64,

    /// Smoothing iterations per flow iteration
    #[arg(long, default_value = "20")]
    smooth_iterations: usize,

    /// Smoothing method
    #[arg(long, value_enum, default_value = "windowed-sinc")]
    smooth_method: SmoothMethod,

    /// Vertex merge tolerance, as a fraction of the bounding box diagonal
    #[arg(long, default_value = "0.05")]
    clean_tolerance: f64,

    /// Longitude and latitude resolution of the tessellated ellipsoid
    #[arg(long, default_value = "30")]
    resolution: usize,

    /// Mesh whose volume the ellipsoid is matched to
    #[arg(long, value_enum, default_value = "flowed")]
    volume_source: MeshSource,

    /// Mesh whose vertices are measured against the ellipsoid
    #[arg(long, value_enum, default_value = "flowed")]
    deviation_source: MeshSource,

    /// Use single-threaded execution (for benchmarking)
    #[arg(long)]
    sequential: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SmoothMethod {
    /// Windowed-sinc low-pass filter (shrinkage-resistant)
    WindowedSinc,
    /// Uniform Laplacian smoothing
    Laplacian,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum MeshSource {
    /// Flowed mesh before smoothing
    Flowed,
    /// Smoothed mesh
    Smoothed,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(&cli.input)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    let method = match cli.smooth_method {
        SmoothMethod::WindowedSinc => smooth::SmoothMethod::WindowedSinc,
        SmoothMethod::Laplacian => smooth::SmoothMethod::Laplacian,
    };
    let volume_source = match cli.volume_source {
        MeshSource::Flowed => pipeline::VolumeSource::Flowed,
        MeshSource::Smoothed => pipeline::VolumeSource::Smoothed,
    };
    let deviation_source = match cli.deviation_source {
        MeshSource::Flowed => pipeline::DeviationSource::Flowed,
        MeshSource::Smoothed => pipeline::DeviationSource::Smoothed,
    };

    let smooth_options = smooth::SmoothOptions::default()
        .with_method(method)
        .with_iterations(cli.smooth_iterations)
        .with_pass_band(cli.pass_band);

    let config = FlowConfig::new(cli.dt)
        .with_max_iterations(cli.max_iter)
        .with_threshold(cli.threshold)
        .with_quantile(cli.quantile)
        .with_smooth(smooth_options)
        .with_clean(CleanOptions::default().with_tolerance(cli.clean_tolerance))
        .with_ellipsoid_resolution(cli.resolution, cli.resolution)
        .with_volume_source(volume_source)
        .with_deviation_source(deviation_source)
        .with_parallel(!cli.sequential);

    let sink = FileSink::new(&cli.output_dir)?;
    let mut controller = FlowController::new(mesh, config, NativeBackend, sink)?;

    let start = Instant::now();
    let outcome = controller.run()?;
    let elapsed = start.elapsed();

    if outcome.state == FlowState::MaxIterExceeded {
        eprintln!("failed to converge after {} iterations", outcome.iterations);
    } else {
        println!(
            "Converged after {} iterations ({:.2?}), deviation {:.6}",
            outcome.iterations, elapsed, outcome.statistic
        );
    }

    let radii = outcome.fit.radii;
    println!("{:.6} {:.6} {:.6}", radii[0], radii[1], radii[2]);
    println!();
    let rotation = outcome.fit.rotation;
    for row in 0..3 {
        println!(
            "{:.6} {:.6} {:.6}",
            rotation[(row, 0)],
            rotation[(row, 1)],
            rotation[(row, 2)]
        );
    }

    Ok(())
}
