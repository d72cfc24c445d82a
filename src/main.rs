use chunkvault::chunker::ChunkerOptions;
use chunkvault::config::Config;
use chunkvault::store::{ChunkStore, FsBlobStore, SqliteIndex};
use chunkvault::sync_engine::SyncEngine;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let config = Config::load();
    let store_root = std::path::Path::new(&config.store.store_root);

    let blob = FsBlobStore::new(store_root.join("chunks"))?;
    let index = SqliteIndex::open(store_root.join("chunks.sqlite3"))?;
    let store = ChunkStore::new(blob, index);

    if std::env::args().nth(1).as_deref() == Some("gc") {
        let reclaimed = store.gc_orphans()?;
        log::info!("gc complete: {} orphan blobs reclaimed", reclaimed.len());
        return Ok(());
    }

    let chunker_opts = ChunkerOptions {
        min_size: config.chunker.min_size,
        avg_size: config.chunker.avg_size,
        max_size: config.chunker.max_size,
        normalization: config.chunker.normalization_level(),
    };

    let engine = SyncEngine::new(&config.store.source_root, store_root, store, chunker_opts);
    engine.run_once()?;
    log::info!("sync pass complete");

    Ok(())
}
