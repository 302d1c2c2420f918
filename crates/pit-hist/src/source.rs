//! Data sources: where nominal and alternate distributions come from.
//!
//! A source is addressed by an identifier (usually a file path) and maps
//! histogram names to distributions. Shape systematics look for alternates
//! either inside the same source or in a *sibling* source whose identifier
//! has a suffix inserted before the extension (`tt.json` → `tt__jesup.json`).

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pit_core::{Memo, Result};
use serde::{Deserialize, Serialize};

use crate::histogram::Distribution;

/// Provider of named distributions.
pub trait DataSource: fmt::Debug {
    /// Source identifier (file path or logical name).
    fn id(&self) -> &str;

    /// Read a distribution. `Ok(None)` means the name is not present;
    /// `Err` means the source itself could not be read.
    fn fetch(&self, name: &str) -> Result<Option<Distribution>>;

    /// Whether a distribution named `name` exists.
    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.fetch(name)?.is_some())
    }

    /// The sibling source with `suffix` inserted before the extension, if it exists.
    fn sibling(&self, suffix: &str) -> Result<Option<Rc<dyn DataSource>>>;

    /// Drop whatever the source keeps open between reads, including the
    /// siblings it resolved. Returns `true` if something was held.
    fn release(&self) -> bool {
        false
    }
}

/// Identifier of the sibling of `id` with `suffix` inserted before the extension.
///
/// ```
/// use pit_hist::sibling_id;
/// assert_eq!(sibling_id("hists/tt.json", "__jesup"), "hists/tt__jesup.json");
/// assert_eq!(sibling_id("tt", "__jesdown"), "tt__jesdown");
/// ```
pub fn sibling_id(id: &str, suffix: &str) -> String {
    let path = Path::new(id);
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return format!("{}{}", id, suffix);
    };
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext),
        None => format!("{}{}", stem, suffix),
    };
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(file_name).to_string_lossy().into_owned()
        }
        _ => file_name,
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Source holding distributions in memory.
///
/// Siblings are registered explicitly and resolved through [`sibling_id`].
#[derive(Debug, Default)]
pub struct MemorySource {
    id: String,
    histograms: BTreeMap<String, Distribution>,
    siblings: HashMap<String, Rc<dyn DataSource>>,
    fetches: Cell<usize>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    /// Add a distribution under its own name.
    pub fn insert(&mut self, dist: Distribution) {
        self.histograms.insert(dist.name().to_string(), dist);
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with(mut self, dist: Distribution) -> Self {
        self.insert(dist);
        self
    }

    /// Register a sibling source under its identifier.
    pub fn with_sibling(mut self, sibling: Rc<dyn DataSource>) -> Self {
        self.siblings.insert(sibling.id().to_string(), sibling);
        self
    }

    /// Number of successful or failed `fetch` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl DataSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, name: &str) -> Result<Option<Distribution>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.histograms.get(name).cloned())
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.histograms.contains_key(name))
    }

    fn sibling(&self, suffix: &str) -> Result<Option<Rc<dyn DataSource>>> {
        Ok(self.siblings.get(&sibling_id(&self.id, suffix)).cloned())
    }
}

// ---------------------------------------------------------------------------
// JSON file source
// ---------------------------------------------------------------------------

/// On-disk record of one distribution (flow-inclusive arrays).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRecord {
    /// Bin edges (length `n_bins + 1`).
    pub bin_edges: Vec<f64>,
    /// Contents including underflow and overflow (length `n_bins + 2`).
    pub contents: Vec<f64>,
    /// Sum of squared weights; defaults to `|contents|` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<Vec<f64>>,
}

impl DistributionRecord {
    /// Validate and convert into a [`Distribution`].
    pub fn into_distribution(self, name: &str) -> Result<Distribution> {
        let variance =
            self.variance.unwrap_or_else(|| self.contents.iter().map(|c| c.abs()).collect());
        Distribution::new(name, self.bin_edges, self.contents, variance)
    }
}

impl From<&Distribution> for DistributionRecord {
    fn from(d: &Distribution) -> Self {
        Self {
            bin_edges: d.bin_edges().to_vec(),
            contents: d.contents().to_vec(),
            variance: Some(d.variance().to_vec()),
        }
    }
}

/// JSON document holding named distributions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramFile {
    /// Distributions by name.
    pub histograms: BTreeMap<String, DistributionRecord>,
}

impl HistogramFile {
    /// Collect distributions into a file document.
    pub fn from_distributions<'a, I>(dists: I) -> Self
    where
        I: IntoIterator<Item = &'a Distribution>,
    {
        Self {
            histograms: dists
                .into_iter()
                .map(|d| (d.name().to_string(), DistributionRecord::from(d)))
                .collect(),
        }
    }

    /// Write as JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let f = File::create(path)?;
        serde_json::to_writer(BufWriter::new(f), self)?;
        Ok(())
    }

    /// Read from a JSON file.
    pub fn read(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(f))?)
    }
}

/// A [`HistogramFile`] on disk, opened on first access.
///
/// The parsed document stays open (like an open file handle) until
/// [`JsonFileSource::close`] or [`DataSource::release`]; the distributions
/// handed out are copies.
pub struct JsonFileSource {
    path: PathBuf,
    id: String,
    doc: Memo<HistogramFile>,
    siblings: RefCell<HashMap<String, Rc<dyn DataSource>>>,
}

impl JsonFileSource {
    /// Create a source for `path` (nothing is read yet).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.to_string_lossy().into_owned();
        Self { path, id, doc: Memo::new(), siblings: RefCell::new(HashMap::new()) }
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document has been read.
    pub fn is_open(&self) -> bool {
        self.doc.is_set()
    }

    /// Drop the parsed document.
    pub fn close(&self) -> bool {
        self.doc.clear()
    }

    fn document(&self) -> Result<Rc<HistogramFile>> {
        self.doc.get_or_try_init(|| {
            let doc = HistogramFile::read(&self.path)?;
            log::debug!("opened {} ({} histograms)", self.id, doc.histograms.len());
            Ok(doc)
        })
    }
}

impl fmt::Debug for JsonFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileSource")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DataSource for JsonFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, name: &str) -> Result<Option<Distribution>> {
        let doc = self.document()?;
        match doc.histograms.get(name) {
            Some(rec) => Ok(Some(rec.clone().into_distribution(name)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.document()?.histograms.contains_key(name))
    }

    fn sibling(&self, suffix: &str) -> Result<Option<Rc<dyn DataSource>>> {
        let sid = sibling_id(&self.id, suffix);
        if let Some(s) = self.siblings.borrow().get(&sid) {
            return Ok(Some(Rc::clone(s)));
        }
        let path = PathBuf::from(&sid);
        if !path.exists() {
            return Ok(None);
        }
        let source: Rc<dyn DataSource> = Rc::new(JsonFileSource::new(path));
        self.siblings.borrow_mut().insert(sid, Rc::clone(&source));
        Ok(Some(source))
    }

    fn release(&self) -> bool {
        let mut released = self.close();
        for sibling in self.siblings.borrow().values() {
            released |= sibling.release();
        }
        released
    }
}
