use std::path::PathBuf;
use std::sync::mpsc::Sender;
use time::{Date, Duration};

use super::archive;
use super::config::RenderConfig;
use super::error::ProcessorError;
use super::plot_surface::PlotSurface;
use super::preprocess::preprocess;
use super::render::render;
use super::stream::Stream;
use super::worker_status::{DayOutcome, WorkerStatus};

/// Load and preprocess the data for one day.
///
/// The returned stream holds only the configured component, detrended and filtered. An
/// archive with nothing for the day, or nothing for the component, is
/// [`ProcessorError::NoData`].
pub fn prepare_day(config: &RenderConfig, day: Date) -> Result<Stream, ProcessorError> {
    let no_data = || ProcessorError::NoData {
        station: format!("{}.{}", config.site.network, config.site.station),
        date: day,
    };

    spdlog::info!(
        "Building helicorder - Network: {} Station: {} Date: {}",
        config.site.network,
        config.site.station,
        day
    );
    let query = config.archive_query(day);
    let stream = archive::load(&query, &config.archive, &config.archive_format)?;
    if stream.is_empty() {
        return Err(no_data());
    }

    let selected = stream.select_component(config.component);
    if selected.is_empty() {
        spdlog::warn!(
            "Found channels {:?} but none with component {}",
            stream
                .channel_ids()
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<String>>(),
            config.component
        );
        return Err(no_data());
    }

    // Filters keep each segment's id and timing, so the filtered stream carries the same
    // title identity as the raw one
    let (_raw, filtered) = preprocess(&selected, &config.detrend, &config.filters)?;
    Ok(filtered)
}

/// Render one day to an image, returning the path written
pub fn render_day(config: &RenderConfig, day: Date) -> Result<PathBuf, ProcessorError> {
    let stream = prepare_day(config, day)?;

    let path = config.get_product_path(day)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    spdlog::info!("Constructing helicorder plot...");
    let mut surface = PlotSurface::new(&path, &config.context);
    render(
        &mut surface,
        &stream,
        day,
        &config.helicorder_params(),
        &config.context,
    )?;
    surface.present()?;
    spdlog::info!("Wrote {}", path.to_string_lossy());
    Ok(path)
}

/// Process a subset of days.
///
/// Days without data are logged and skipped; any other failure stops the worker.
pub fn process_subset(
    config: RenderConfig,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<Date>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut written = Vec::new();
    let n_days = subset.len();
    for (idx, day) in subset.into_iter().enumerate() {
        tx.send(WorkerStatus::new(
            idx as f32 / n_days as f32,
            day,
            worker_id,
            DayOutcome::InProgress,
        ))?;
        let outcome = match render_day(&config, day) {
            Ok(path) => {
                written.push(path);
                DayOutcome::Rendered
            }
            Err(e) if e.is_no_data() => {
                spdlog::warn!("{e}, skipping...");
                DayOutcome::NoData
            }
            Err(e) => return Err(e),
        };
        tx.send(WorkerStatus::new(
            (idx + 1) as f32 / n_days as f32,
            day,
            worker_id,
            outcome,
        ))?;
    }
    Ok(written)
}

/// Divide an inclusive date range in to a set of subsets (per thread/worker)
pub fn create_subsets(first: Date, last: Date, n_threads: usize) -> Vec<Vec<Date>> {
    let mut subsets: Vec<Vec<Date>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    let mut day = first;
    let mut idx = 0;
    while day <= last {
        subsets[idx % n_subsets].push(day);
        idx += 1;
        day = match day.checked_add(Duration::days(1)) {
            Some(next) => next,
            None => break,
        };
    }

    subsets
}

/// Render every day in `first..=last` on `config.n_threads` workers.
///
/// Progress is reported on `tx`. Returns the written paths, sorted, once every worker has
/// finished; the first worker failure is returned instead if there was one.
pub fn render_range(
    config: &RenderConfig,
    first: Date,
    last: Date,
    tx: Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut workers = Vec::new();
    for (idx, subset) in create_subsets(first, last, config.n_threads)
        .into_iter()
        .enumerate()
    {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let tx = tx.clone();
        workers.push((
            idx,
            std::thread::spawn(move || process_subset(conf, tx, idx, subset)),
        ));
    }
    drop(tx);

    let mut written = Vec::new();
    let mut failure = None;
    for (idx, worker) in workers {
        match worker.join() {
            Ok(Ok(paths)) => {
                spdlog::info!("Worker {} complete", idx);
                written.extend(paths);
            }
            Ok(Err(e)) => {
                spdlog::error!("Worker {} failed: {}", idx, e);
                failure.get_or_insert(e);
            }
            Err(_) => {
                spdlog::error!("An error occured joining worker {}!", idx);
                failure.get_or_insert(ProcessorError::WorkerPanic(idx));
            }
        }
    }
    match failure {
        Some(e) => Err(e),
        None => {
            written.sort();
            Ok(written)
        }
    }
}
