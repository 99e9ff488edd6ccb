//! # Classification Store
//!
//! Remembers, across runs, which IPv4 addresses answered quickly (*allow*) and which
//! were slow or unreachable (*deny*). Each side is a Roaring bitmap over the `u32`
//! address space, persisted in the portable Roaring format.
//!
//! Persisted sets only ever grow: saving re-reads the file on disk and writes back the
//! union with the in-memory additions. That tolerates another process having updated
//! the file since we loaded it, but two concurrent writers can still lose each other's
//! additions.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use roaring::RoaringBitmap;
use tracing::{debug, warn};

/// One persisted membership set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BitmapSet {
    bitmap: RoaringBitmap,
}

impl BitmapSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path`. A missing or corrupt file yields an empty set.
    pub fn load(path: &Path) -> Self {
        match read_bitmap(path) {
            Ok(bitmap) => Self { bitmap },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No bitmap at {}, starting empty", path.display());
                Self::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable bitmap {}: {e}", path.display());
                Self::new()
            }
        }
    }

    pub fn contains(&self, ip: u32) -> bool {
        self.bitmap.contains(ip)
    }

    pub fn contains_addr(&self, ip: Ipv4Addr) -> bool {
        self.contains(u32::from(ip))
    }

    pub fn insert(&mut self, ip: u32) -> bool {
        self.bitmap.insert(ip)
    }

    /// Adds addresses in memory only; nothing is written until [`BitmapSet::save`].
    pub fn add_batch<I>(&mut self, ips: I)
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        self.bitmap.extend(ips.into_iter().map(u32::from));
    }

    pub fn len(&self) -> u64 {
        self.bitmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    /// Merges with whatever is currently persisted at `path` and writes the union back.
    ///
    /// The in-memory set also absorbs the persisted members.
    pub fn save(&mut self, path: &Path) -> io::Result<()> {
        let persisted = BitmapSet::load(path);
        self.bitmap |= persisted.bitmap;
        write_bitmap(path, &self.bitmap)
    }
}

fn read_bitmap(path: &Path) -> io::Result<RoaringBitmap> {
    let reader = BufReader::new(File::open(path)?);
    RoaringBitmap::deserialize_from(reader)
}

fn write_bitmap(path: &Path, bitmap: &RoaringBitmap) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        bitmap.serialize_into(&mut out)?;
        out.flush()?;
    }
    fs::rename(&tmp, path)
}

/// The allow and deny sets together with the files they persist to.
#[derive(Debug, Clone)]
pub struct ClassificationStore {
    pub allow: BitmapSet,
    pub deny: BitmapSet,
    allow_path: PathBuf,
    deny_path: PathBuf,
}

impl ClassificationStore {
    pub fn load(allow_path: impl Into<PathBuf>, deny_path: impl Into<PathBuf>) -> Self {
        let allow_path = allow_path.into();
        let deny_path = deny_path.into();
        Self {
            allow: BitmapSet::load(&allow_path),
            deny: BitmapSet::load(&deny_path),
            allow_path,
            deny_path,
        }
    }

    pub fn is_allowed(&self, ip: u32) -> bool {
        self.allow.contains(ip)
    }

    pub fn is_denied(&self, ip: u32) -> bool {
        self.deny.contains(ip)
    }

    /// Unions both sets into their files.
    pub fn save(&mut self) -> io::Result<()> {
        self.allow.save(&self.allow_path)?;
        self.deny.save(&self.deny_path)?;
        debug!(
            "Classification saved: {} allowed, {} denied",
            self.allow.len(),
            self.deny.len()
        );
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
