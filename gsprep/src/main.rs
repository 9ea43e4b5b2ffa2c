use clap::Parser;
use gsprep_lib::camera::{derive_camera, load_cameras};
use gsprep_lib::structures::{SplatPoint, TIGHT_POINT_STRIDE};
use gsprep_lib::{load_splat_file, pack_points_bytes};
use std::error::Error;
use std::fs;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "Gaussian Splat Preprocessor",
    version = "1.0",
    about = "Decodes Gaussian splat point-cloud files into renderer-ready buffers"
)]
struct Cli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        required = true,
        help = "Path to the input point-cloud file."
    )]
    input: String,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "OUTPUT",
        required = true,
        help = "Path for the packed point buffer."
    )]
    output: String,

    #[arg(
        short = 'c',
        long = "cameras",
        value_name = "CAMERAS",
        help = "Path to the camera configuration JSON."
    )]
    cameras: Option<String>,

    #[arg(
        long = "camera-index",
        value_name = "INDEX",
        default_value = "0",
        help = "Which view from the camera configuration to derive."
    )]
    camera_index: usize,

    #[arg(
        long = "camera-output",
        value_name = "CAMERA_OUTPUT",
        help = "Path for the derived camera parameter buffer (requires --cameras)."
    )]
    camera_output: Option<String>,

    #[arg(
        short = 's',
        long = "stride",
        value_name = "STRIDE",
        help = "Per-point byte stride reported by shader reflection; defaults to the tightly packed size."
    )]
    stride: Option<usize>,

    #[arg(
        short = 'a',
        long = "async",
        default_value = "false",
        help = "Read the input file through the asynchronous path."
    )]
    async_mode: bool,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.camera_output.is_some() && cli.cameras.is_none() {
        eprintln!("Error: --camera-output requires --cameras.");
        process::exit(1);
    }

    let stride = cli.stride.unwrap_or(TIGHT_POINT_STRIDE);
    let mode = if cli.async_mode {
        "Asynchronous"
    } else {
        "Synchronous"
    };
    println!(
        "Mode: {} | Input: {} | Output: {} | Stride: {} bytes",
        mode, cli.input, cli.output, stride
    );

    let start = Instant::now();

    let points: Vec<SplatPoint> = if cli.async_mode {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(async {
            gsprep_lib::load_splat_file_async(&cli.input)
                .await
                .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
        })?
    } else {
        load_splat_file(&cli.input).map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)?
    };

    let degenerate = points.iter().filter(|p| !p.rotation_is_finite()).count();
    println!(
        "Decoded {} points in {} ms ({} with degenerate rotation)",
        points.len(),
        start.elapsed().as_millis(),
        degenerate
    );

    let packed =
        pack_points_bytes(&points, stride).map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)?;
    fs::write(&cli.output, &packed).unwrap_or_else(|e| {
        eprintln!("Error writing output '{}': {}", cli.output, e);
        process::exit(1);
    });
    println!("Wrote {} bytes to '{}'.", packed.len(), cli.output);

    if let Some(camera_path) = &cli.cameras {
        let json = fs::read_to_string(camera_path).unwrap_or_else(|e| {
            eprintln!("Error reading camera configuration '{}': {}", camera_path, e);
            process::exit(1);
        });
        let views =
            load_cameras(&json).map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)?;
        let view = views.get(cli.camera_index).unwrap_or_else(|| {
            eprintln!(
                "Error: camera index {} out of range ({} views).",
                cli.camera_index,
                views.len()
            );
            process::exit(1);
        });

        let camera = derive_camera(view);
        println!(
            "Camera {}: eye ({:.3}, {:.3}, {:.3}) | {}x{} | fx {:.1} fy {:.1}",
            cli.camera_index,
            camera.params[0],
            camera.params[1],
            camera.params[2],
            camera.size[0],
            camera.size[1],
            camera.params[9],
            camera.params[10]
        );

        if let Some(camera_output) = &cli.camera_output {
            let bytes = camera.to_bytes();
            fs::write(camera_output, &bytes).unwrap_or_else(|e| {
                eprintln!("Error writing camera buffer '{}': {}", camera_output, e);
                process::exit(1);
            });
            println!("Wrote {} bytes to '{}'.", bytes.len(), camera_output);
        }
    }

    Ok(())
}
