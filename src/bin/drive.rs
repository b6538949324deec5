use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use route_animator::animation::{player, AnimationDriver, CameraFrame};
use route_animator::config::Config;
use route_animator::endpoints::{format_lng_lat, geocoder_label, is_coordinates, parse_lng_lat, RouteEndpoints};
use route_animator::geo::Coordinate;
use route_animator::session::{Session, SessionEvent};
use route_animator::state::AppState;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Start location as "lng,lat"
    #[arg(long)]
    start: Option<String>,

    /// End location as "lng,lat"
    #[arg(long)]
    end: Option<String>,

    /// Page URL carrying start/end query parameters
    #[arg(long)]
    url: Option<String>,

    /// Intermediate stop as "lng,lat" (repeatable)
    #[arg(long = "via")]
    waypoints: Vec<String>,

    /// Measurement parameter to sample along the route
    #[arg(long, default_value = "pm25")]
    parameter: String,

    /// Number of sample points along the route
    #[arg(long)]
    points: Option<usize>,

    /// Skip air-quality sampling
    #[arg(long)]
    no_samples: bool,

    /// Print every Nth frame
    #[arg(long, default_value_t = 1)]
    every: usize,

    /// Playback speed in km per second
    #[arg(long)]
    speed: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_animator=info,drive=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if args.speed.is_some_and(|speed| !(speed.is_finite() && speed > 0.0)) {
        bail!("--speed must be a positive number of km per second");
    }
    let config = Config::from_env();
    let num_points = args.points.unwrap_or(config.sample_points);
    let state = AppState::new(config);

    let (endpoints, mut page_url) = resolve_endpoints(&args)?;
    let waypoints = args
        .waypoints
        .iter()
        .map(|raw| coordinate_arg("--via", raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut session = Session::new();
    session.subscribe(|event| match event {
        SessionEvent::EndpointsChanged { start, end } => {
            tracing::info!("Endpoints: start={:?} end={:?}", start, end)
        }
        SessionEvent::RouteChanged { generation, length_km } => {
            tracing::info!("Route #{} ready: {:.2} km", generation, length_km)
        }
        SessionEvent::SamplesUpdated { generation, samples } => {
            tracing::info!("Route #{}: {} sample points", generation, samples)
        }
    });
    session.set_start(endpoints.start);
    session.set_end(endpoints.end);
    println!("From: {}", geocoder_label(endpoints.start));
    println!("To:   {}", geocoder_label(endpoints.end));

    if let Some(url) = page_url.as_mut() {
        endpoints.write_to_url(url);
        println!("Share: {}", url);
    }

    let route = state
        .directions()
        .route(endpoints.start, endpoints.end, &waypoints)
        .await
        .context("Error fetching route")?;
    let route = Arc::new(route);
    session.set_route(Arc::clone(&route));

    let sampling = match session.begin_sampling() {
        Some(ticket) if !args.no_samples => {
            let sampler = state.sampler();
            let parameter = args.parameter.clone();
            Some(tokio::spawn(async move {
                let samples = sampler.sample(&ticket.route, &parameter, num_points).await;
                (ticket.generation, samples)
            }))
        }
        _ => None,
    };

    let (frame_tx, mut frames) = mpsc::unbounded_channel::<CameraFrame>();
    let mut driver = AnimationDriver::new(frame_tx);
    if let Some(speed) = args.speed {
        driver = driver.with_speed(speed);
    }
    let (player, player_task) = player::spawn(driver);
    player.set_route(Arc::clone(&route)).await?;
    player.play().await?;

    let every = args.every.max(1);
    let mut printed = 0usize;
    while let Some(frame) = frames.recv().await {
        if printed % every == 0 || frame.progress_km >= route.length_km() {
            println!("{}", serde_json::to_string(&frame)?);
        }
        printed += 1;
        if frame.progress_km >= route.length_km() {
            break;
        }
    }
    player.shutdown().await?;
    player_task.await.map_err(|err| anyhow!("Animation task failed: {}", err))?;

    if let Some(sampling) = sampling {
        let (generation, samples) = sampling.await.map_err(|err| anyhow!("Sampling task failed: {}", err))?;
        if session.apply_samples(generation, samples) {
            for sample in session.samples() {
                println!(
                    "{} {:.2} {} at {} ({:.2} km)",
                    sample.parameter,
                    sample.value,
                    sample.unit,
                    format_lng_lat(sample.coordinates),
                    sample.distance_km
                );
            }
            for average in session.averages() {
                println!(
                    "Average {} over {} points: {:.2} {}",
                    average.parameter, average.count, average.average, average.unit
                );
            }
        }
    }

    Ok(())
}

fn resolve_endpoints(args: &Args) -> Result<(RouteEndpoints, Option<Url>)> {
    if let Some(raw) = args.url.as_deref() {
        let url = Url::parse(raw).context("Invalid --url")?;
        let from_url = RouteEndpoints::from_url(&url)?;
        let endpoints = match (from_url, args.start.as_deref(), args.end.as_deref()) {
            (_, Some(start), Some(end)) => {
                RouteEndpoints::new(coordinate_arg("--start", start)?, coordinate_arg("--end", end)?)
            }
            (Some(endpoints), _, _) => endpoints,
            (None, _, _) => bail!("Please select both start and end points"),
        };
        return Ok((endpoints, Some(url)));
    }

    match (args.start.as_deref(), args.end.as_deref()) {
        (Some(start), Some(end)) => Ok((
            RouteEndpoints::new(coordinate_arg("--start", start)?, coordinate_arg("--end", end)?),
            None,
        )),
        _ => bail!("Please select both start and end points"),
    }
}

fn coordinate_arg(flag: &str, raw: &str) -> Result<Coordinate> {
    if !is_coordinates(raw) {
        bail!("{} expects \"lng,lat\"; place names are not geocoded: {:?}", flag, raw);
    }
    Ok(parse_lng_lat(raw)?)
}
