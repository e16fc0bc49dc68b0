//! Snow matrix runner
//!
//! Runs the cooperative visualization loop against a display driver until
//! Ctrl+C is pressed.
//!
//! ## Architecture
//! - One thread, one loop: poll the active visualization, push the
//!   framebuffer when it changed, sleep briefly
//! - Ctrl+C flips an `AtomicBool` that the loop checks every iteration
//!
//! ## Usage
//! ```sh
//! ./target/release/snow-matrix --wind 40 --snow-rate 150
//! RUST_LOG=debug ./target/release/snow-matrix --driver headless --export
//! ```

use clap::{Parser, ValueEnum};
use snow_matrix::control::{self, SelectRequest};
use snow_matrix::driver::{DEFAULT_INTENSITY, HeadlessDriver, MatrixDriver, TerminalDriver};
use snow_matrix::framebuffer::MAX_COLUMNS;
use snow_matrix::render::{MatrixContext, render_loop};
use snow_matrix::visualization::SnowSettingsUpdate;
use snow_matrix::{Color, MATRIX_COLS, MATRIX_ROWS, PanelConfig, setup_signal_handler};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverKind {
    /// Draw the grid in this terminal
    Terminal,
    /// Keep the simulation running without output
    Headless,
    /// RGB LED panel (requires the `hardware` feature)
    Panel,
}

/// Run LED-matrix visualizations
#[derive(Parser)]
#[command(name = "snow-matrix")]
#[command(about = "Run snow and other visualizations on a monochrome LED grid")]
#[command(version)]
struct Args {
    /// Visualization to start with (snow, columns, canvas)
    #[arg(long, default_value = "snow")]
    visualization: String,

    /// Number of rows on the grid
    #[arg(long, default_value_t = MATRIX_ROWS)]
    rows: usize,

    /// Number of columns on the grid (at most 32)
    #[arg(long, default_value_t = MATRIX_COLS)]
    cols: usize,

    /// Milliseconds per gravity step (0 freezes the snow)
    #[arg(long)]
    gravity: Option<u64>,

    /// Milliseconds per new snowflake (0 stops snowfall)
    #[arg(long)]
    snow_rate: Option<u64>,

    /// Milliseconds per melted snowflake (0 stops melting)
    #[arg(long)]
    melt_rate: Option<u64>,

    /// Chance in percent that a flake drifts sideways (clamped to 100)
    #[arg(long)]
    wind: Option<u32>,

    /// Seed for a reproducible snowfall
    #[arg(long)]
    seed: Option<u64>,

    /// Display intensity (0-15)
    #[arg(long, default_value_t = DEFAULT_INTENSITY)]
    brightness: u8,

    /// Where frames go
    #[arg(long, value_enum, default_value = "terminal")]
    driver: DriverKind,

    /// Physical panel rows, for the panel driver
    #[arg(long, default_value = "64")]
    panel_rows: usize,

    /// Physical panel columns, for the panel driver
    #[arg(long, default_value = "64")]
    panel_cols: usize,

    /// Milliseconds to sleep between loop iterations
    #[arg(long, default_value = "1")]
    poll_ms: u64,

    /// Print the final framebuffer as JSON on exit
    #[arg(long)]
    export: bool,
}

fn build_driver(args: &Args, grid: PanelConfig) -> Result<Box<dyn MatrixDriver>, Box<dyn std::error::Error>> {
    match args.driver {
        DriverKind::Terminal => Ok(Box::new(TerminalDriver::new(Color::default()))),
        DriverKind::Headless => Ok(Box::new(HeadlessDriver::default())),
        #[cfg(feature = "hardware")]
        DriverKind::Panel => {
            use snow_matrix::driver::PanelDriver;
            let panel = PanelConfig::new(args.panel_rows, args.panel_cols);
            Ok(Box::new(PanelDriver::new(grid, panel, Color::default())?))
        }
        #[cfg(not(feature = "hardware"))]
        DriverKind::Panel => {
            let _ = (grid, args.panel_rows, args.panel_cols);
            Err("the panel driver requires the 'hardware' feature (cargo build --features hardware)".into())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();

    if args.cols > MAX_COLUMNS {
        tracing::warn!("{} columns requested, clamping to {}", args.cols, MAX_COLUMNS);
    }
    let grid = PanelConfig::new(args.rows, args.cols.min(MAX_COLUMNS));

    tracing::info!("Snow matrix v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Grid: {}x{}", grid.cols, grid.rows);
    tracing::info!("Driver: {:?}", args.driver);

    let driver = build_driver(&args, grid)?;
    let mut ctx = MatrixContext::new(grid, driver);

    control::select_visualization(
        &mut ctx,
        SelectRequest {
            id: Some(args.visualization.clone()),
        },
    )?;
    let brightness = ctx.driver_mut().set_intensity(args.brightness);
    tracing::info!("Brightness: {}", brightness);

    if let Some(snow) = ctx.active_mut().and_then(|v| v.as_snow_mut()) {
        if let Some(seed) = args.seed {
            snow.reseed(seed);
        }
        let settings = snow.apply(SnowSettingsUpdate {
            gravity: args.gravity,
            snow_rate: args.snow_rate,
            melt_rate: args.melt_rate,
            wind: args.wind,
        });
        tracing::info!(
            "Snow: gravity={}ms snow_rate={}ms melt_rate={}ms wind={}%",
            settings.gravity,
            settings.snow_rate,
            settings.melt_rate,
            settings.wind
        );
    }

    if matches!(args.driver, DriverKind::Terminal) {
        // Clear the screen once; frames redraw from the top-left corner.
        print!("\x1b[2J");
    }

    let running = setup_signal_handler()?;
    render_loop(&mut ctx, &running, Duration::from_millis(args.poll_ms));

    if args.export {
        println!("{}", serde_json::to_string(&control::display(&ctx))?);
    }

    tracing::info!("Shutting down cleanly.");
    Ok(())
}
