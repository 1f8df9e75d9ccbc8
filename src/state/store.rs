//! Segment database access

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::state::segment::{Segment, SegmentType};
use crate::state::world::{SportType, WorldId};

type Cache<K> = Mutex<IndexMap<K, Vec<Arc<Segment>>, ahash::RandomState>>;

/// Source of the routable segment graph and the climb/sprint markers
pub trait SegmentStore: Send + Sync {
    fn load_segments(&self, world: WorldId, sport: SportType) -> Result<Vec<Arc<Segment>>>;
    fn load_markers(&self, world: WorldId) -> Result<Vec<Arc<Segment>>>;
}

fn is_marker(segment: &Segment) -> bool {
    matches!(segment.segment_type, SegmentType::Climb | SegmentType::Sprint)
}

/// Reads `segments-<world>.json` and `markers-<world>.json` from a directory
pub struct JsonSegmentStore {
    dir: PathBuf,
    segments: Cache<(WorldId, SportType)>,
    markers: Cache<WorldId>,
}

impl JsonSegmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            segments: Mutex::new(IndexMap::default()),
            markers: Mutex::new(IndexMap::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, file_name: String) -> Result<Vec<Segment>> {
        let path = self.dir.join(file_name);
        debug!("Reading segments from {}", path.display());
        let data = std::fs::read(&path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn cached<K: std::hash::Hash + Eq>(
        cache: &Cache<K>,
        key: K,
        load: impl FnOnce() -> Result<Vec<Arc<Segment>>>,
    ) -> Result<Vec<Arc<Segment>>> {
        let mut cache = cache
            .lock()
            .map_err(|_| Error::Io("segment cache poisoned".into()))?;
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }
        let loaded = load()?;
        cache.insert(key, loaded.clone());
        Ok(loaded)
    }
}

impl SegmentStore for JsonSegmentStore {
    fn load_segments(&self, world: WorldId, sport: SportType) -> Result<Vec<Arc<Segment>>> {
        Self::cached(&self.segments, (world, sport), || {
            let segments: Vec<Arc<Segment>> = self
                .read(format!("segments-{}.json", world))?
                .into_iter()
                .filter(|s| sport.allows(s.sport))
                .map(|s| Arc::new(s.with_world(world)))
                .collect();
            if segments.is_empty() {
                return Err(Error::SegmentNotFound(format!("no {:?} segments for {}", sport, world)));
            }
            info!("Loaded {} segments for {}", segments.len(), world);
            Ok(segments)
        })
    }

    fn load_markers(&self, world: WorldId) -> Result<Vec<Arc<Segment>>> {
        Self::cached(&self.markers, world, || {
            let path = self.dir.join(format!("markers-{}.json", world));
            if !path.exists() {
                debug!("No markers for {}", world);
                return Ok(Vec::new());
            }
            let markers: Vec<Arc<Segment>> = self
                .read(format!("markers-{}.json", world))?
                .into_iter()
                .filter(is_marker)
                .map(|s| Arc::new(s.with_world(world)))
                .collect();
            info!("Loaded {} markers for {}", markers.len(), world);
            Ok(markers)
        })
    }
}

/// In-memory store, mostly for tests and replays
#[derive(Default)]
pub struct MemorySegmentStore {
    segments: Vec<Arc<Segment>>,
    markers: Vec<Arc<Segment>>,
}

impl MemorySegmentStore {
    pub fn new(segments: Vec<Arc<Segment>>) -> Self {
        Self { segments, markers: Vec::new() }
    }

    pub fn with_markers(mut self, markers: Vec<Arc<Segment>>) -> Self {
        self.markers = markers;
        self
    }
}

impl SegmentStore for MemorySegmentStore {
    fn load_segments(&self, world: WorldId, sport: SportType) -> Result<Vec<Arc<Segment>>> {
        Ok(self
            .segments
            .iter()
            .filter(|s| (s.world == world || s.world == WorldId::Unknown) && sport.allows(s.sport))
            .cloned()
            .collect())
    }

    fn load_markers(&self, world: WorldId) -> Result<Vec<Arc<Segment>>> {
        Ok(self
            .markers
            .iter()
            .filter(|s| s.world == world || s.world == WorldId::Unknown)
            .filter(|s| is_marker(s))
            .cloned()
            .collect())
    }
}
