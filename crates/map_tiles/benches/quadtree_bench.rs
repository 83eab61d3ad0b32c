//! Quadtree and mesh benchmarks.
//!
//! - **update**: full refine/balance/neighbour pass for a camera 500 m above
//!   tile 10/512/340, at a few heights
//! - **pan**: update + prune while the camera moves, so blocks are freed
//!   and reused
//! - **mesh_library**: building all sixteen stitched meshes

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use map_tiles::{Camera, FrameView, GeoSpace, Quadtree, QuadtreeConfig, TileKey, TileMeshLibrary, WebMercatorSpace};

const VIEW_TILE: TileKey = TileKey::new(10, 512, 340);

fn camera_at(position: DVec3, far: f64) -> Camera {
  Camera::look_at(
    position,
    position - DVec3::new(0.0, -position.z * 0.5, position.z),
    60f64.to_radians(),
    16.0 / 9.0,
    1.0,
    far,
  )
}

fn bench_update(c: &mut Criterion) {
  let mut group = c.benchmark_group("quadtree_update");
  let space = Arc::new(WebMercatorSpace::centred_on_tile(VIEW_TILE));

  for height in [200.0, 500.0, 2000.0] {
    let camera = camera_at(DVec3::new(0.0, 0.0, height), height * 2.0);
    let view = FrameView::new(space.as_ref(), &camera, 19, 0.0, 1.0 / 60.0);
    let mut tree = Quadtree::new(QuadtreeConfig::default(), space.clone());
    tree.update(&view);

    group.bench_with_input(BenchmarkId::from_parameter(height as u32), &view, |b, view| {
      b.iter(|| {
        tree.update(black_box(view));
        black_box(tree.stats().leaves)
      })
    });
  }

  group.finish();
}

fn bench_pan(c: &mut Criterion) {
  let space = Arc::new(WebMercatorSpace::centred_on_tile(VIEW_TILE));
  let mut tree = Quadtree::new(QuadtreeConfig::default(), space.clone());
  let mut step = 0u32;

  c.bench_function("quadtree_pan", |b| {
    b.iter(|| {
      step = (step + 1) % 64;
      let position = DVec3::new(step as f64 * 150.0, 0.0, 500.0);
      let view = FrameView::new(space.as_ref(), &camera_at(position, 1000.0), 19, 0.0, 1.0 / 60.0);
      tree.update(&view);
      black_box(tree.prune())
    })
  });
}

fn bench_mesh_library(c: &mut Criterion) {
  c.bench_function("mesh_library", |b| b.iter(|| black_box(TileMeshLibrary::new())));
}

fn bench_slippy(c: &mut Criterion) {
  let space = WebMercatorSpace::centred_on_tile(VIEW_TILE);
  c.bench_function("tile_corners_z19", |b| {
    b.iter(|| black_box(space.tile_corners(black_box(TileKey::new(19, 262_144, 174_080)), 0.0)))
  });
}

criterion_group!(benches, bench_update, bench_pan, bench_mesh_library, bench_slippy);
criterion_main!(benches);
