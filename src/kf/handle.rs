//! The result handle through which fragments read a KF result file.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow;
use log;
use ndarray::Array1;

use crate::fragment::index_mapping::{map_sfo_indices, SfoIndexMapping};
use crate::kf::cache::BoundedCache;
use crate::kf::{KfRead, KfVariable};

#[cfg(test)]
#[path = "handle_tests.rs"]
mod handle_tests;

/// The number of per-irrep overlap matrices kept in memory at any one time.
pub const OVERLAP_CACHE_CAPACITY: usize = 2;

/// The number of SFO index mappings kept in memory at any one time.
pub const INDEX_MAPPING_CACHE_CAPACITY: usize = 4;

/// The KF variable holding the packed lower-triangular SFO overlap matrix of an irrep. The
/// section is the irrep label itself.
pub const OVERLAP_MATRIX_VARIABLE: &str = "S-CoreSFO";

/// Cache key for SFO index mappings: the frozen-core counts per irrep (sorted by irrep label) and
/// whether symmetry is used.
type IndexMappingKey = (BTreeMap<String, usize>, bool);

/// A read-only handle over a KF result file, together with the bounded caches used for overlap
/// look-ups.
///
/// The caches only hold data derived from the underlying file, so every query gives the same
/// result whether or not it is served from a cache. The caches use interior mutability and the
/// handle is therefore not [`Sync`].
pub struct ResultHandle {
    /// The underlying KF reader.
    reader: Box<dyn KfRead>,

    /// Per-irrep overlap matrices.
    overlap_matrices: RefCell<BoundedCache<String, Rc<Array1<f64>>>>,

    /// SFO index mappings.
    index_mappings: RefCell<BoundedCache<IndexMappingKey, Rc<SfoIndexMapping>>>,
}

impl ResultHandle {
    /// Wraps a KF reader into a handle with the default cache capacities.
    pub fn new<R: KfRead + 'static>(reader: R) -> Self {
        Self::with_cache_capacities(reader, OVERLAP_CACHE_CAPACITY, INDEX_MAPPING_CACHE_CAPACITY)
    }

    /// Wraps a KF reader into a handle with custom cache capacities. A capacity of zero disables
    /// the corresponding cache.
    pub fn with_cache_capacities<R: KfRead + 'static>(
        reader: R,
        overlap_capacity: usize,
        index_mapping_capacity: usize,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            overlap_matrices: RefCell::new(BoundedCache::new(overlap_capacity)),
            index_mappings: RefCell::new(BoundedCache::new(index_mapping_capacity)),
        }
    }

    /// Returns the packed lower-triangular overlap matrix of the SFOs in `irrep`.
    pub fn overlap_matrix(&self, irrep: &str) -> Result<Rc<Array1<f64>>, anyhow::Error> {
        self.overlap_matrices
            .borrow_mut()
            .get_or_try_insert_with(irrep.to_string(), || {
                log::debug!("Reading the SFO overlap matrix of irrep {irrep}.");
                let values = self.reader.read_floats(irrep, OVERLAP_MATRIX_VARIABLE)?;
                Ok::<_, anyhow::Error>(Rc::new(Array1::from_vec(values)))
            })
    }

    /// Returns the SFO index mapping for the given frozen-core counts and symmetry usage. See
    /// [`map_sfo_indices`].
    pub fn sfo_index_mapping(
        &self,
        frozen_cores_per_irrep: &BTreeMap<String, usize>,
        use_symmetry: bool,
    ) -> Result<Rc<SfoIndexMapping>, anyhow::Error> {
        let key = (frozen_cores_per_irrep.clone(), use_symmetry);
        self.index_mappings
            .borrow_mut()
            .get_or_try_insert_with(key, || {
                log::debug!(
                    "Building the SFO index mapping (symmetry: {use_symmetry}, frozen cores: {frozen_cores_per_irrep:?})."
                );
                map_sfo_indices(self, frozen_cores_per_irrep, use_symmetry).map(Rc::new)
            })
    }

    /// The numbers of cached overlap matrices and cached index mappings.
    pub fn cache_occupancy(&self) -> (usize, usize) {
        (
            self.overlap_matrices.borrow().len(),
            self.index_mappings.borrow().len(),
        )
    }

    /// Drops everything held in the caches.
    pub fn clear_caches(&self) {
        self.overlap_matrices.borrow_mut().clear();
        self.index_mappings.borrow_mut().clear();
    }
}

impl KfRead for ResultHandle {
    fn read(&self, section: &str, variable: &str) -> Result<KfVariable, anyhow::Error> {
        self.reader.read(section, variable)
    }

    fn contains(&self, section: &str, variable: &str) -> bool {
        self.reader.contains(section, variable)
    }

    fn section_names(&self) -> Vec<String> {
        self.reader.section_names()
    }
}

impl fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n_overlaps, n_mappings) = self.cache_occupancy();
        f.debug_struct("ResultHandle")
            .field("sections", &self.section_names())
            .field("cached_overlap_matrices", &n_overlaps)
            .field("cached_index_mappings", &n_mappings)
            .finish()
    }
}
