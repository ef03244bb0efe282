//! Tune glTF tiles on disk, writing the results as `.glb` files.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use buffer::{BufferCache, BufferError, BufferFile};
use clap::Parser;
use cli::Cli;
use gltf_tuner::{Anim4DRules, GltfTuner, MaterialRules, TuneError, TunerConfig};
use tile_geometry::{
    de::gltf::{from_slice, DeError},
    ser::gltf::{to_glb, SerError},
};

mod buffer;
mod cli;

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("{path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path:?}: {source}")]
    Buffer { path: PathBuf, source: BufferError },
    #[error("failed to read rules from {path:?}: {source}")]
    Rules {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    De { path: PathBuf, source: DeError },
    #[error("failed to tune {path:?}: {source}")]
    Tune { path: PathBuf, source: TuneError },
    #[error("failed to write {path:?}: {source}")]
    Ser { path: PathBuf, source: SerError },
    #[error("{0} of {1} tiles failed")]
    Failed(usize, usize),
    #[error("a worker thread panicked")]
    Panicked,
}

fn read_rules<R: serde::de::DeserializeOwned>(path: &Path) -> Result<R, Error> {
    let data = BufferFile::new(path).map_err(|source| Error::Buffer {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| Error::Rules {
        path: path.to_owned(),
        source,
    })
}

/// Primitive counts of one tuned tile.
struct Report {
    before: usize,
    after: usize,
    stale: bool,
}

#[tracing::instrument(skip(tuner, cache, out_dir))]
fn tune_file(
    tuner: &GltfTuner,
    cache: &BufferCache,
    path: &Path,
    out_dir: &Path,
) -> Result<Report, Error> {
    let bytes = BufferFile::new(path).map_err(|source| Error::Buffer {
        path: path.to_owned(),
        source,
    })?;
    let doc = from_slice(&bytes, |uri| {
        cache
            .load(path, uri)
            .map(|data| data.to_vec())
            .map_err(Into::into)
    })
    .map_err(|source| Error::De {
        path: path.to_owned(),
        source,
    })?;

    let tuned = tuner.tune(&doc).map_err(|source| Error::Tune {
        path: path.to_owned(),
        source,
    })?;

    let out = out_dir
        .join(path.file_stem().unwrap_or(path.as_os_str()))
        .with_extension("glb");
    let glb = to_glb(&tuned.document).map_err(|source| Error::Ser {
        path: out.clone(),
        source,
    })?;
    fs::write(&out, glb).map_err(|source| Error::Io {
        path: out.clone(),
        source,
    })?;

    let report = Report {
        before: doc.primitive_count(),
        after: tuned.document.primitive_count(),
        stale: tuned.is_stale(tuner),
    };
    tracing::info!(
        out = ?out,
        before = report.before,
        after = report.after,
        generation = tuned.generation,
        "tuned tile"
    );
    Ok(report)
}

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
fn report_memory() {
    use tikv_jemalloc_ctl::{epoch, stats};
    if let (Ok(_), Ok(allocated), Ok(resident)) =
        (epoch::advance(), stats::allocated::read(), stats::resident::read())
    {
        tracing::debug!(allocated, resident, "memory usage");
    }
}

#[cfg(not(all(feature = "jemalloc", not(target_env = "msvc"))))]
fn report_memory() {}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    cli::initialize_tracing(&cli);

    let tuner = GltfTuner::new(TunerConfig {
        tune_without_rules: cli.tune_without_rules,
    })
    .with_material_info_observer(|materials| {
        tracing::debug!(?materials, "tile uses iTwin materials");
    });
    if let Some(path) = &cli.material_rules {
        tuner.set_material_rules(read_rules::<MaterialRules>(path)?);
    }
    if let Some(path) = &cli.anim4d_rules {
        tuner.set_anim4d_rules(read_rules::<Anim4DRules>(path)?);
    }
    fs::create_dir_all(&cli.out_dir).map_err(|source| Error::Io {
        path: cli.out_dir.clone(),
        source,
    })?;

    let jobs = cli
        .jobs
        .or_else(|| thread::available_parallelism().ok().map(usize::from))
        .unwrap_or(1)
        .clamp(1, cli.files.len());
    let cache = BufferCache::new();
    let (send, recv) = crossbeam::channel::unbounded::<&Path>();
    for file in &cli.files {
        // the receiver outlives this loop
        let _ = send.send(file);
    }
    drop(send);

    let failed = AtomicUsize::new(0);
    let before = AtomicUsize::new(0);
    let after = AtomicUsize::new(0);
    let stale = AtomicUsize::new(0);
    crossbeam::scope(|s| {
        for _ in 0..jobs {
            s.spawn(|_| {
                for path in recv.iter() {
                    match tune_file(&tuner, &cache, path, &cli.out_dir) {
                        Ok(report) => {
                            before.fetch_add(report.before, Ordering::Relaxed);
                            after.fetch_add(report.after, Ordering::Relaxed);
                            if report.stale {
                                stale.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(error) => {
                            tracing::error!(%error, "failed to tune tile");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    })
    .map_err(|_| Error::Panicked)?;

    tracing::info!(
        tiles = cli.files.len(),
        primitives_before = before.into_inner(),
        primitives_after = after.into_inner(),
        stale = stale.into_inner(),
        "done"
    );
    report_memory();

    match failed.into_inner() {
        0 => Ok(()),
        n => Err(Error::Failed(n, cli.files.len())),
    }
}
