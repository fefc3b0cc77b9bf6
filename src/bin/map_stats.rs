//! Builds a procedural grid map and prints what the spatial core made
//! of it: BSP shape, subspaces, clusters and a few line-of-sight probes.

use anyhow::{Context, Result};
use clap::Parser;
use glam::{DVec2, DVec3};

use mapspace::bsp::NullListener;
use mapspace::{LineFlags, Map, MapEditor, MobjLinkFlags, SectorId, SightFlags};

#[derive(Parser)]
#[command(about = "Build a procedural map and report spatial statistics")]
struct Args {
    /// Rooms along the x axis.
    #[arg(long, default_value_t = 4)]
    cols: usize,

    /// Rooms along the y axis.
    #[arg(long, default_value_t = 3)]
    rows: usize,

    /// Room edge length in map units.
    #[arg(long, default_value_t = 128.0)]
    room_size: f64,

    /// Cost attributed to splitting a segment while partitioning.
    #[arg(long, default_value_t = 7)]
    split_cost: i32,
}

/// Grid of rooms, every interior border a two-sided line.
fn build_grid(args: &Args) -> Result<Map> {
    let mut editor = MapEditor::new();
    editor.set_split_cost_factor(args.split_cost);
    let s = args.room_size;

    let mut sectors = Vec::with_capacity(args.cols * args.rows);
    for j in 0..args.rows {
        for i in 0..args.cols {
            let light = 0.4 + 0.6 * ((i + j) % 3) as f32 / 2.0;
            let floor = ((i + j) % 3) as f64 * 8.0;
            let ceiling = 128.0 - ((i * j) % 2) as f64 * 16.0;
            sectors.push(editor.create_sector(light, floor, ceiling));
        }
    }
    let cell = |i: usize, j: usize| sectors[j * args.cols + i];

    // Vertical borders at x = i*s. Front faces +x, so the right-hand
    // cell owns the front except on the far east wall.
    for i in 0..=args.cols {
        for j in 0..args.rows {
            let x = i as f64 * s;
            let (y0, y1) = (j as f64 * s, (j + 1) as f64 * s);
            let lo = editor.create_vertex(DVec2::new(x, y0));
            let hi = editor.create_vertex(DVec2::new(x, y1));
            let (from, to, front, back): (_, _, SectorId, Option<SectorId>) = if i == args.cols {
                (hi, lo, cell(i - 1, j), None)
            } else if i == 0 {
                (lo, hi, cell(0, j), None)
            } else {
                (lo, hi, cell(i, j), Some(cell(i - 1, j)))
            };
            editor
                .create_line(from, to, LineFlags::empty(), Some(front), back)
                .context("grid line")?;
        }
    }
    // Horizontal borders at y = j*s. Front faces -y (the cell below).
    for j in 0..=args.rows {
        for i in 0..args.cols {
            let y = j as f64 * s;
            let (x0, x1) = (i as f64 * s, (i + 1) as f64 * s);
            let west = editor.create_vertex(DVec2::new(x0, y));
            let east = editor.create_vertex(DVec2::new(x1, y));
            let (from, to, front, back): (_, _, SectorId, Option<SectorId>) = if j == 0 {
                (east, west, cell(i, 0), None)
            } else if j == args.rows {
                (west, east, cell(i, j - 1), None)
            } else {
                (west, east, cell(i, j - 1), Some(cell(i, j)))
            };
            editor
                .create_line(from, to, LineFlags::empty(), Some(front), back)
                .context("grid line")?;
        }
    }

    Ok(editor.end_editing(&mut NullListener)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut map = build_grid(&args)?;
    let s = args.room_size;

    println!(
        "map: {} lines, {} sectors, bounds {:?}..{:?}",
        map.line_count(),
        map.sector_count(),
        map.bounds().min,
        map.bounds().max
    );
    println!(
        "bsp: {} nodes, {} leafs, {} subspaces, {} segments, {} vertexes added",
        map.bsp().node_count(),
        map.bsp().leaf_count(),
        map.bsp().subspace_count(),
        map.bsp().segment_count(),
        map.bsp().vertexes_added()
    );
    let clusters: usize = (0..map.sector_count())
        .map(|i| {
            map.sector(i as SectorId)
                .map(|sec| sec.clusters.len())
                .unwrap_or(0)
        })
        .sum();
    println!("clusters: {clusters} across {} sectors", map.sector_count());

    // Drop a mobj in the middle of the grid and see what it touches.
    let center = DVec2::new(args.cols as f64 * s / 2.0, args.rows as f64 * s / 2.0);
    let mobj = map.add_mobj(center.extend(24.0), 16.0, 56.0);
    map.link_mobj(mobj, MobjLinkFlags::all())?;
    let mut touched = 0usize;
    map.for_all_lines_touching_mobj(mobj, |_| {
        touched += 1;
        true
    })?;
    println!(
        "mobj at {center:?}: sector {:?}, touching {touched} line(s)",
        map.sector_at(center)
    );

    // Line-of-sight probes from the first room to every other room center.
    let eye = DVec3::new(s / 2.0, s / 2.0, 40.0);
    let mut vc = map.new_valid_count();
    let mut open = 0usize;
    for j in 0..args.rows {
        for i in 0..args.cols {
            let target = DVec3::new((i as f64 + 0.5) * s, (j as f64 + 0.5) * s, 40.0);
            if map.check_line_of_sight(&mut vc, eye, target, -1.0, 1.0, SightFlags::empty()) {
                open += 1;
            }
        }
    }
    println!("sight: {open}/{} room centers visible from {eye:?}", args.cols * args.rows);

    Ok(())
}
