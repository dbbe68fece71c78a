use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tilegeom::{TileCoord, TileExtents};
use tracing::info;

use crate::config::RenderConfig;
use crate::feature::Feature;
use crate::render::{RenderSummary, Renderer};
use crate::sink::{FeatureSink, RenderedFeature};

/// Everything one feature rendered to, handed to the writer in one piece.
#[derive(Default)]
struct Batch {
    features: Vec<(TileCoord, RenderedFeature)>,
    summary: RenderSummary,
}

/// Render `features` on a worker pool and feed the results to `sink`.
///
/// The sink runs on the calling thread and sees all tiles of a feature
/// together, but features arrive in no particular order. Workers block once
/// `queue_capacity` batches are waiting.
pub fn render_all<I, S>(features: I, config: &RenderConfig, extents: &TileExtents, sink: &mut S) -> Result<RenderSummary>
where
    I: Iterator<Item = Feature> + Send,
    S: FeatureSink + ?Sized,
{
    config.validate()?;
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = config.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build().context("[pipeline::render_all] Failed to build worker pool")?;
    info!(threads = pool.current_num_threads(), min_zoom = config.min_zoom, max_zoom = config.max_zoom, "rendering features");

    let renderer = Renderer::new(config, extents);
    let (tx, rx) = mpsc::sync_channel::<Batch>(config.queue_capacity);
    let mut summary = RenderSummary::default();

    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                features.par_bridge().for_each_with(tx, |tx, feature| {
                    let mut batch = Batch::default();
                    batch.summary = renderer.render(&feature, &mut batch.features);
                    // the writer only hangs up after every sender is gone
                    let _ = tx.send(batch);
                });
            });
        });

        for batch in rx {
            for (tile, feature) in batch.features {
                sink.accept(tile, feature);
            }
            summary += batch.summary;
        }
    });

    info!(
        features = summary.features,
        emitted = summary.emitted,
        filled = summary.filled,
        repaired = summary.repaired,
        skipped_zooms = summary.skipped_zooms,
        "finished rendering"
    );
    Ok(summary)
}
