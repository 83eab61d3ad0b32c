//! Headless tile streaming probe.
//!
//! Places a camera above a geographic position, runs the tile renderer
//! against a null backend and logs quadtree and fetch statistics until the
//! view is fully loaded (or the frame limit is reached).

mod config;

use anyhow::Result;
use clap::Parser;
use glam::{DVec2, DVec3};
use map_tiles::{
	pick_map_plane, Camera, GeoSpace, LatLong, NullBackend, TileKey, TileRenderer,
	WebMercatorSpace,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use web_time::Instant;

use config::{CameraConfig, Config};

/// Headless slippy-map tile streaming probe.
#[derive(Parser, Debug)]
#[command(name = "tile_probe")]
#[command(about = "Streams map tiles around a virtual camera and reports statistics")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Latitude of the point below the camera.
	#[arg(long, allow_hyphen_values = true)]
	lat: Option<f64>,

	/// Longitude of the point below the camera.
	#[arg(long, allow_hyphen_values = true)]
	lon: Option<f64>,

	/// Camera height above the map in metres.
	#[arg(long)]
	height: Option<f64>,

	/// Tile server address (http(s):// or a local directory).
	#[arg(short, long)]
	server: Option<String>,

	/// Frames to simulate.
	#[arg(short, long)]
	frames: Option<u32>,

	/// Draw the wireframe pass too.
	#[arg(long)]
	wireframe: bool,
}

fn main() -> Result<()> {
	let _ = tracing_subscriber::fmt::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::builder()
				.with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
				.from_env_lossy(),
		)
		.try_init();

	let args = Args::parse();
	let mut config = match &args.config {
		Some(path) => {
			info!(path = %path.display(), "loading config");
			Config::load(path)?
		}
		None => Config::default(),
	};
	apply_overrides(&mut config, &args);
	config.validate()?;

	run(&config)
}

fn apply_overrides(config: &mut Config, args: &Args) {
	if let Some(lat) = args.lat {
		config.camera.lat = lat;
	}
	if let Some(lon) = args.lon {
		config.camera.lon = lon;
	}
	if let Some(height) = args.height {
		config.camera.height = height;
	}
	if let Some(server) = &args.server {
		config.tiles.tile_server_address = server.clone();
	}
	if let Some(frames) = args.frames {
		config.frames = frames;
	}
	config.tiles.show_wireframe |= args.wireframe;
}

/// Camera at `offset` metres from the local origin, tilted north.
fn probe_camera(camera: &CameraConfig, offset: DVec2) -> Camera {
	let position = offset.extend(camera.height);
	let tilt = camera.tilt_deg.to_radians();
	let target = position + DVec3::new(0.0, camera.height * tilt.tan(), -camera.height);
	Camera::look_at(
		position,
		target,
		camera.fov_deg.to_radians(),
		16.0 / 9.0,
		1.0,
		camera.far_plane,
	)
}

fn run(config: &Config) -> Result<()> {
	let centre = LatLong::new(config.camera.lat, config.camera.lon);
	let space = Arc::new(WebMercatorSpace::centred_on(centre));
	let mut backend = NullBackend::new();
	let mut renderer = TileRenderer::new(config.tiles.clone(), space.clone(), &mut backend)?;

	info!(
		lat = centre.lat,
		lon = centre.lon,
		height = config.camera.height,
		server = %config.tiles.tile_server_address,
		"probe started"
	);

	let frame_time = 1.0 / config.fps;
	let started = Instant::now();
	let mut offset = DVec2::ZERO;
	let mut frames_run = 0;
	let mut settled = false;

	for frame in 0..config.frames {
		let camera = probe_camera(&config.camera, offset);
		let view = renderer.frame_view(&camera, frame_time);
		renderer.update(&mut backend, &view);
		renderer.render(&mut backend, &camera.view, &camera.projection);
		frames_run = frame + 1;

		if frame % config.fps.max(1.0) as u32 == 0 {
			log_frame(&renderer, frame, view.view_tile);
		}
		if config.camera.pan_speed == 0.0 && frame > 0 && !renderer.is_loading() {
			settled = true;
			break;
		}

		offset.y += config.camera.pan_speed * frame_time;
		std::thread::sleep(Duration::from_secs_f64(frame_time));
	}

	let camera = probe_camera(&config.camera, offset);
	let metrics = renderer.metrics();
	let (min_update_us, max_update_us) = metrics.update_range_us().unwrap_or_default();
	info!(
		frames = frames_run,
		settled,
		elapsed_ms = started.elapsed().as_millis() as u64,
		uploads = metrics.uploads,
		failed = metrics.fetch.failed,
		released = metrics.released,
		avg_update_us = metrics.avg_update_us() as u64,
		min_update_us,
		max_update_us,
		"probe finished"
	);

	let ray = camera.ray_through(DVec2::ZERO);
	match pick_map_plane(&ray, config.tiles.map_height, camera.far_plane) {
		Some(hit) => {
			let tile = space.local_to_slippy(hit, config.tiles.max_zoom);
			let key = TileKey::new(config.tiles.max_zoom, tile.x, tile.y);
			info!(x = hit.x, y = hit.y, tile = %key, "screen centre");
		}
		None => info!("screen centre does not hit the map"),
	}

	renderer.destroy(&mut backend);
	Ok(())
}

fn log_frame(renderer: &TileRenderer, frame: u32, view_tile: TileKey) {
	let metrics = renderer.metrics();
	info!(
		frame,
		view_tile = %view_tile,
		nodes = metrics.touched_nodes(),
		leaves = metrics.leaves,
		visible = metrics.visible_leaves,
		deepest = metrics.deepest_zoom,
		queued = metrics.queued,
		in_flight = metrics.in_flight,
		loaded = metrics.uploads,
		draws = metrics.draws,
		fallback = metrics.fallback_draws,
		update_us = metrics.last_update_us().unwrap_or_default(),
		"frame"
	);
}
