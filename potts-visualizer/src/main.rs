use anyhow::{anyhow, Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::{Rgb, RgbImage};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use palette::{FromColor, Hsv, Srgb};
use plotters::prelude::*;
use potts_common::{read_snapshot, EnergyRecord, LatticeSnapshot, OutputFormat};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding lattice_<k> snapshots and energy.csv
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the rendered frames (defaults to the input directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pixels per lattice site
    #[arg(long, default_value_t = 4)]
    scale: u32,

    /// Background (air) color name
    /// (black, white, red, green, blue, yellow, cyan, magenta)
    #[arg(long, default_value = "white")]
    bg_color: String,

    /// Seed for shuffling the cell palette
    #[arg(long, default_value_t = 1)]
    palette_seed: u64,

    /// Skip plotting energy.csv
    #[arg(long)]
    no_plot: bool,
}

// Color definitions for named colors
const COLOR_MAP: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
];

const COLLAGEN_GREY: [u8; 3] = [128, 128, 128];
const COLLAGEN_BLEND: f32 = 0.45;
const PERIMETER_SHADE: f32 = 0.6;

/// Parse a color name to RGB values
fn parse_color(color_name: &str) -> [u8; 3] {
    for &(name, color) in COLOR_MAP {
        if name.eq_ignore_ascii_case(color_name) {
            return color;
        }
    }
    warn!("Color '{}' not recognized, using white.", color_name);
    [255, 255, 255]
}

/// One color per cell id; index 0 is unused (air).
fn generate_color_palette(num_cells: usize, seed: u64) -> Vec<[u8; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut colors = Vec::with_capacity(num_cells + 1);

    for i in 0..num_cells {
        // Spread hues evenly, jitter saturation and value a little
        let hue = (i as f32) / (num_cells.max(1) as f32);
        let saturation = 0.7 + rng.random_range(-0.1..0.1);
        let value = 0.85 + rng.random_range(-0.1..0.1);

        let rgb = Srgb::from_color(Hsv::new(hue * 360.0, saturation, value));
        colors.push([
            (rgb.red * 255.0) as u8,
            (rgb.green * 255.0) as u8,
            (rgb.blue * 255.0) as u8,
        ]);
    }

    // Shuffle the colors to make neighboring ids less similar
    colors.shuffle(&mut rng);
    colors.insert(0, [0, 0, 0]);
    colors
}

fn blend(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 * (1.0 - t) + y as f32 * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

fn shade(color: [u8; 3], factor: f32) -> [u8; 3] {
    color.map(|c| (c as f32 * factor).round() as u8)
}

/// Whether the site at `(i, j)` has a periodic 4-neighbor with a different id.
fn is_perimeter(snapshot: &LatticeSnapshot, i: usize, j: usize) -> bool {
    let n = snapshot.size as usize;
    let id = snapshot.cell_ids[i * n + j];
    let neighbors = [
        ((i + 1) % n, j),
        ((i + n - 1) % n, j),
        (i, (j + 1) % n),
        (i, (j + n - 1) % n),
    ];
    neighbors.iter().any(|&(ni, nj)| snapshot.cell_ids[ni * n + nj] != id)
}

/// Renders one snapshot: site `(i, j)` covers the `scale x scale` block at
/// pixel column `i * scale`, row `j * scale`.
fn render_frame(snapshot: &LatticeSnapshot, scale: u32, bg_color: [u8; 3], palette: &[[u8; 3]]) -> RgbImage {
    let n = snapshot.size as usize;
    let side = snapshot.size * scale;
    let mut image = RgbImage::from_pixel(side, side, Rgb(bg_color));

    for i in 0..n {
        for j in 0..n {
            let idx = i * n + j;
            let id = snapshot.cell_ids[idx] as usize;
            let mut color = if id == 0 {
                bg_color
            } else {
                let base = palette.get(id).copied().unwrap_or([0, 0, 0]);
                if is_perimeter(snapshot, i, j) {
                    shade(base, PERIMETER_SHADE)
                } else {
                    base
                }
            };
            if snapshot.collagen[idx] {
                color = blend(color, COLLAGEN_GREY, COLLAGEN_BLEND);
            }

            let (x0, y0) = (i as u32 * scale, j as u32 * scale);
            for dx in 0..scale {
                for dy in 0..scale {
                    image.put_pixel(x0 + dx, y0 + dy, Rgb(color));
                }
            }
        }
    }
    image
}

/// Snapshot files in `dir`, sorted by their index.
fn find_snapshots(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut found = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory '{}'", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            continue;
        };
        if OutputFormat::from_extension(ext).is_none() {
            continue;
        }
        if let Some(index) = stem.strip_prefix("lattice_").and_then(|k| k.parse::<u32>().ok()) {
            found.push((index, path));
        }
    }

    found.sort_by_key(|(index, _)| *index);
    Ok(found)
}

fn read_energy_log(path: &Path) -> Result<Vec<EnergyRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open energy log '{}'", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: EnergyRecord =
            row.with_context(|| format!("Malformed row in '{}'", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Total energy (top) and acceptance ratio (bottom) against iteration.
fn plot_energy(records: &[EnergyRecord], out_path: &Path) -> Result<()> {
    if records.is_empty() {
        warn!("Energy log is empty; skipping plot.");
        return Ok(());
    }

    let last_iteration = records.iter().map(|r| r.iteration).max().unwrap_or(0).max(1) as f64;
    let (mut e_min, mut e_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for r in records {
        e_min = e_min.min(r.total_energy);
        e_max = e_max.max(r.total_energy);
    }
    if e_max - e_min < 1e-9 {
        e_min -= 1.0;
        e_max += 1.0;
    }

    let root = BitMapBackend::new(out_path, (1200, 900)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("{e}"))?;
    let panels = root.split_evenly((2, 1));

    let mut energy_chart = ChartBuilder::on(&panels[0])
        .caption("Total energy", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..last_iteration, e_min..e_max)
        .map_err(|e| anyhow!("{e}"))?;
    energy_chart
        .configure_mesh()
        .x_desc("iteration")
        .y_desc("H")
        .draw()
        .map_err(|e| anyhow!("{e}"))?;
    energy_chart
        .draw_series(LineSeries::new(
            records.iter().map(|r| (r.iteration as f64, r.total_energy)),
            &BLUE,
        ))
        .map_err(|e| anyhow!("{e}"))?;

    let mut acceptance_chart = ChartBuilder::on(&panels[1])
        .caption("Acceptance ratio", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..last_iteration, 0.0..1.0)
        .map_err(|e| anyhow!("{e}"))?;
    acceptance_chart
        .configure_mesh()
        .x_desc("iteration")
        .y_desc("accepted / attempted")
        .draw()
        .map_err(|e| anyhow!("{e}"))?;
    acceptance_chart
        .draw_series(LineSeries::new(
            records
                .iter()
                .filter(|r| r.iteration > 0)
                .map(|r| (r.iteration as f64, r.acceptance_ratio)),
            &RED,
        ))
        .map_err(|e| anyhow!("{e}"))?;

    root.present().map_err(|e| anyhow!("{e}"))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Potts Visualizer...");
    let output_dir = args.output.clone().unwrap_or_else(|| args.input.clone());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;
    info!("Input directory: {}", args.input.display());
    info!("Output directory: {}", output_dir.display());

    let snapshots = find_snapshots(&args.input)?;
    if snapshots.is_empty() {
        warn!("No lattice snapshots found in {}.", args.input.display());
    } else {
        render_all(&snapshots, &output_dir, &args)?;
    }

    if !args.no_plot {
        let log_path = args.input.join("energy.csv");
        if log_path.exists() {
            let records = read_energy_log(&log_path)?;
            let plot_path = output_dir.join("energy.png");
            plot_energy(&records, &plot_path)?;
            info!("Energy plot saved to {}", plot_path.display());
        } else {
            warn!("No energy.csv in {}; skipping plot.", args.input.display());
        }
    }

    Ok(())
}

fn render_all(snapshots: &[(u32, PathBuf)], output_dir: &Path, args: &Args) -> Result<()> {
    // Palette size is fixed by the first snapshot so colors stay stable across frames
    let first = read_snapshot(&snapshots[0].1)?;
    let palette = generate_color_palette(first.max_cell_id() as usize, args.palette_seed);
    let bg_color = parse_color(&args.bg_color);
    info!(
        "Rendering {} snapshots of a {}x{} lattice with {} cells at {} px per site.",
        snapshots.len(),
        first.size,
        first.size,
        first.max_cell_id(),
        args.scale
    );

    let progress_bar = ProgressBar::new(snapshots.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .map_err(|e| anyhow!("{e}"))?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    snapshots
        .par_iter()
        .progress_with(progress_bar.clone())
        .try_for_each(|(index, path)| -> Result<()> {
            let snapshot = read_snapshot(path)?;
            let frame = render_frame(&snapshot, args.scale, bg_color, &palette);
            let frame_path = output_dir.join(format!("frame_{}.png", index));
            frame
                .save(&frame_path)
                .with_context(|| format!("Failed to write frame '{}'", frame_path.display()))
        })?;
    progress_bar.finish_with_message("done");

    let duration = start_time.elapsed();
    info!(
        "Rendered {} frames in {:.2?} ({:.1} frames per second)",
        snapshots.len(),
        duration,
        snapshots.len() as f64 / duration.as_secs_f64().max(1e-9)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use potts_common::write_snapshot;

    fn small_snapshot(index: u32) -> LatticeSnapshot {
        // 3x3 lattice: cell 1 fills the left column, collagen on the center
        let mut cell_ids = vec![0; 9];
        cell_ids[0] = 1;
        cell_ids[1] = 1;
        cell_ids[2] = 1;
        let mut collagen = vec![false; 9];
        collagen[4] = true;
        LatticeSnapshot {
            index,
            iteration: index * 10,
            size: 3,
            cell_ids,
            collagen,
        }
    }

    #[test]
    fn palette_is_stable_per_seed() {
        let a = generate_color_palette(12, 7);
        let b = generate_color_palette(12, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 13);
    }

    #[test]
    fn frame_marks_air_perimeter_and_collagen() {
        let snapshot = small_snapshot(0);
        let palette = vec![[0, 0, 0], [200, 100, 50]];
        let image = render_frame(&snapshot, 2, [255, 255, 255], &palette);
        assert_eq!(image.dimensions(), (6, 6));
        // Site (0, 0) is a perimeter site of cell 1
        assert_eq!(image.get_pixel(0, 0).0, shade([200, 100, 50], PERIMETER_SHADE));
        // Site (2, 2) is air
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255]);
        // Site (1, 1) is air over collagen
        assert_eq!(image.get_pixel(2, 3).0, blend([255, 255, 255], COLLAGEN_GREY, COLLAGEN_BLEND));
    }

    #[test]
    fn snapshots_are_found_in_index_order() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for index in [10, 2, 0] {
            let path = dir.path().join(format!("lattice_{}.json", index));
            write_snapshot(&path, &small_snapshot(index), OutputFormat::Json).unwrap();
        }
        fs::write(dir.path().join("energy.csv"), "iteration\n").unwrap();
        fs::write(dir.path().join("lattice_notes.txt"), "").unwrap();

        let found = find_snapshots(dir.path()).unwrap();
        let indices: Vec<u32> = found.iter().map(|(k, _)| *k).collect();
        assert_eq!(indices, vec![0, 2, 10]);
    }
}
