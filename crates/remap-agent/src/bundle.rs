//! Configuration bundle download and validation.
//!
//! The bundle is streamed to a private file in a run-scoped work
//! directory, extracted next to it, and checked for the expected shape
//! (one top-level directory holding `gen/`) before anything is installed.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use remap_client::{Method, RequestExecutor};
use remap_common::encoding::hex_encode;
use remap_common::paths::GEN_DIR;
use remap_common::Ia;
use sha2::{Digest, Sha256};

use crate::error::RemapError;
use crate::protocol::{download_gen_path, SessionPayload};

const ARCHIVE_NAME: &str = "bundle.tar";
const EXTRACT_DIR: &str = "extracted";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Work directory ────────────────────────────────────────────────

/// Scratch space for one run, removed when dropped.
///
/// Lives under the installation root so the final rename into the active
/// slot never crosses a filesystem boundary.
pub struct WorkDir {
    dir: tempfile::TempDir,
}

impl WorkDir {
    pub fn create_in(root: &Path) -> Result<Self, RemapError> {
        let dir = tempfile::Builder::new()
            .prefix(".remap-")
            .tempdir_in(root)
            .map_err(|e| {
                RemapError::io(format!("cannot create work directory in {}", root.display()), e)
            })?;
        tracing::debug!(path = %dir.path().display(), "Work directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn archive_path(&self) -> PathBuf {
        self.path().join(ARCHIVE_NAME)
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.path().join(EXTRACT_DIR)
    }
}

// ── Download ──────────────────────────────────────────────────────

/// Fetch the configuration bundle for `ia` into `work`.
pub fn download(
    exec: &RequestExecutor,
    ia: &Ia,
    payload: &SessionPayload,
    work: &WorkDir,
) -> Result<PathBuf, RemapError> {
    let resp = exec.execute(Method::Post, &download_gen_path(ia), Some(&payload.to_value()))?;
    if resp.status() != 200 {
        return Err(RemapError::DownloadFailed(format!(
            "Coordinator answered HTTP {} from {}",
            resp.status(),
            resp.url()
        )));
    }

    let path = work.archive_path();
    let file = File::create(&path)
        .map_err(|e| RemapError::io(format!("cannot create {}", path.display()), e))?;
    let mut sink = HashingWriter::new(file);
    std::io::copy(&mut resp.into_reader(), &mut sink)
        .map_err(|e| RemapError::DownloadFailed(format!("reading bundle body: {e}")))?;
    let (size, digest) = sink
        .finish()
        .map_err(|e| RemapError::io(format!("cannot write {}", path.display()), e))?;

    if size == 0 {
        return Err(RemapError::DownloadFailed("empty bundle body".into()));
    }

    tracing::info!(
        path = %path.display(),
        size,
        sha256 = %digest,
        "Configuration bundle downloaded"
    );
    Ok(path)
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    fn finish(mut self) -> std::io::Result<(u64, String)> {
        self.inner.flush()?;
        Ok((self.written, hex_encode(&self.hasher.finalize())))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

// ── Extraction ────────────────────────────────────────────────────

/// Extract `archive` into `dest` and return the bundle's `gen` directory.
///
/// `dest` must not exist yet. The active configuration is never touched.
pub fn extract_and_validate(archive: &Path, dest: &Path) -> Result<PathBuf, RemapError> {
    std::fs::create_dir(dest)
        .map_err(|e| RemapError::io(format!("cannot create {}", dest.display()), e))?;

    let reader = open_archive(archive)?;
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| {
        RemapError::Extraction(format!("cannot unpack {}: {e}", archive.display()))
    })?;

    let top = single_top_level_dir(dest)?;
    let gen = top.join(GEN_DIR);
    // `gen` itself must be a real directory; links are not followed.
    let is_dir = match std::fs::symlink_metadata(&gen) {
        Ok(meta) => meta.file_type().is_dir(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(RemapError::io(format!("cannot stat {}", gen.display()), e)),
    };
    if !is_dir {
        return Err(RemapError::MalformedBundle(format!(
            "top-level directory {} has no {GEN_DIR}/ directory",
            display_name(&top)
        )));
    }

    tracing::debug!(path = %gen.display(), "Bundle validated");
    Ok(gen)
}

/// Open the archive, transparently decompressing gzip.
fn open_archive(archive: &Path) -> Result<Box<dyn Read>, RemapError> {
    let file = File::open(archive)
        .map_err(|e| RemapError::io(format!("cannot open {}", archive.display()), e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 2];
    let peeked = read_prefix(&mut reader, &mut magic)
        .map_err(|e| RemapError::io(format!("cannot read {}", archive.display()), e))?;
    let prefix = std::io::Cursor::new(magic[..peeked].to_vec());
    let chained = prefix.chain(reader);

    if peeked == GZIP_MAGIC.len() && magic == GZIP_MAGIC {
        tracing::debug!("Bundle is gzip-compressed");
        Ok(Box::new(flate2::read::GzDecoder::new(chained)))
    } else {
        Ok(Box::new(chained))
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn single_top_level_dir(dest: &Path) -> Result<PathBuf, RemapError> {
    let entries = std::fs::read_dir(dest)
        .map_err(|e| RemapError::io(format!("cannot list {}", dest.display()), e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RemapError::io(format!("cannot list {}", dest.display()), e))?;

    match entries.as_slice() {
        [] => Err(RemapError::MalformedBundle("archive is empty".into())),
        [only] => {
            let path = only.path();
            let is_dir = only
                .file_type()
                .map_err(|e| RemapError::io(format!("cannot stat {}", path.display()), e))?
                .is_dir();
            if is_dir {
                Ok(path)
            } else {
                Err(RemapError::MalformedBundle(format!(
                    "top-level entry {} is not a directory",
                    display_name(&path)
                )))
            }
        }
        many => {
            let mut names: Vec<String> = many.iter().map(|e| display_name(&e.path())).collect();
            names.sort();
            Err(RemapError::MalformedBundle(format!(
                "expected one top-level directory, found {}: {}",
                names.len(),
                names.join(", ")
            )))
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
