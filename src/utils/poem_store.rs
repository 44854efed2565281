#![forbid(unsafe_code)]

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use path_absolutize::Absolutize;

use crate::utils::errors::Errors;
use crate::utils::poem_names::{file_poem_name, text_poem_name};
use crate::utils::poems_utils::timestamp_utc;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Number of poem names returned by one listing page.
pub const PER_PAGE : usize = 10;

// ***************************************************************************
//                               Store Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// FileUpload:
// ---------------------------------------------------------------------------
/// An uploaded poem file as received from the client.
#[derive(Debug)]
pub struct FileUpload {
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: Option<String>, content: Vec<u8>) -> Self {
        Self {file_name, content}
    }
}

// ---------------------------------------------------------------------------
// PoemStore:
// ---------------------------------------------------------------------------
/** The poems directory and every operation that touches it.
 *
 * Each poem is exactly one file directly inside the poems directory.  The file
 * name is the poem's public name and its sort key.  There is no index and no
 * in-memory state, so concurrent requests only share the directory itself.
 */
#[derive(Debug)]
pub struct PoemStore {
    poems_dir: PathBuf,
}

impl PoemStore {
    // ---------------------------------------------------------------------------
    // open:
    // ---------------------------------------------------------------------------
    /** Use the given directory as the poems directory, creating it if it doesn't
     * exist.  The directory path is canonicalized once here so that name
     * resolution can compare against it exactly.
     */
    pub fn open(poems_dir: impl AsRef<Path>) -> Result<Self, Errors> {
        let dir = poems_dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            info!("Created poems directory {:?}.", dir);
        }

        let poems_dir = fs::canonicalize(dir)?;
        if !poems_dir.is_dir() {
            let msg = format!("The poems path is not a directory: {:?}", poems_dir);
            return Err(Errors::StorageIO(std::io::Error::new(std::io::ErrorKind::Other, msg)));
        }

        Ok(Self {poems_dir})
    }

    /// The canonical poems directory.
    pub fn poems_dir(&self) -> &Path {
        &self.poems_dir
    }

    // ***************************************************************************
    //                              Submissions
    // ***************************************************************************
    // ---------------------------------------------------------------------------
    // store_text:
    // ---------------------------------------------------------------------------
    /** Save the trimmed text as a new poem and return its generated name.
     * Text that is empty after trimming is rejected and nothing is written.
     */
    pub fn store_text(&self, text: &str) -> Result<String, Errors> {
        self.store_text_at(text, timestamp_utc())
    }

    fn store_text_at(&self, text: &str, ts: DateTime<Utc>) -> Result<String, Errors> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Errors::EmptyInput);
        }

        let name = text_poem_name(ts);
        self.write_poem(&name, text.as_bytes())?;
        Ok(name)
    }

    // ---------------------------------------------------------------------------
    // store_file:
    // ---------------------------------------------------------------------------
    /** Save an uploaded file's bytes verbatim as a new poem and return its
     * generated name.  No upload means nothing is written.
     */
    pub fn store_file(&self, upload: Option<FileUpload>) -> Result<String, Errors> {
        self.store_file_at(upload, timestamp_utc())
    }

    fn store_file_at(&self, upload: Option<FileUpload>, ts: DateTime<Utc>) -> Result<String, Errors> {
        let upload = match upload {
            Some(u) => u,
            None => return Err(Errors::MissingFile),
        };

        let name = file_poem_name(ts, upload.file_name.as_deref());
        self.write_poem(&name, &upload.content)?;
        Ok(name)
    }

    // ---------------------------------------------------------------------------
    // write_poem:
    // ---------------------------------------------------------------------------
    // An existing file with the same name is overwritten.
    fn write_poem(&self, name: &str, content: &[u8]) -> Result<(), Errors> {
        let path = self.poems_dir.join(name);
        match fs::write(&path, content) {
            Ok(_) => {
                info!("Saved poem {} ({} bytes).", name, content.len());
                Ok(())
            },
            Err(e) => {
                error!("Error saving poem to {:?}: {}", path, e);
                Err(Errors::StorageIO(e))
            },
        }
    }

    // ***************************************************************************
    //                                Listing
    // ***************************************************************************
    // ---------------------------------------------------------------------------
    // list_page:
    // ---------------------------------------------------------------------------
    /** Return one page of poem names, newest first.
     *
     * Names are sorted in descending lexicographic order, which is newest first
     * as long as the timestamp prefixes have the same number of digits.  Page
     * numbers start at 1; a page of 0 is treated as 1.  Pages past the end are
     * empty.
     */
    pub fn list_page(&self, page: usize, per_page: usize) -> Result<Vec<String>, Errors> {
        let mut names = self.list_names()?;
        names.sort_unstable_by(|a, b| b.cmp(a));

        let start = (page.max(1) - 1).saturating_mul(per_page);
        Ok(names.into_iter().skip(start).take(per_page).collect())
    }

    // ---------------------------------------------------------------------------
    // list_names:
    // ---------------------------------------------------------------------------
    // Every immediate entry of the poems directory counts as a poem.
    fn list_names(&self) -> Result<Vec<String>, Errors> {
        let entries = match fs::read_dir(&self.poems_dir) {
            Ok(e) => e,
            Err(e) => {
                error!("Error reading poems directory {:?}: {}", self.poems_dir, e);
                return Err(Errors::StorageIO(e));
            },
        };

        let mut names = vec!();
        for entry in entries {
            let entry = entry.map_err(|e| {
                error!("Unable to access a directory entry in {:?}: {}", self.poems_dir, e);
                Errors::StorageIO(e)
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    // ***************************************************************************
    //                               Retrieval
    // ***************************************************************************
    // ---------------------------------------------------------------------------
    // get_by_name:
    // ---------------------------------------------------------------------------
    /** Return the full content of the named poem.  Names that escape the poems
     * directory are rejected before any file is read.
     */
    pub fn get_by_name(&self, name: &str) -> Result<Vec<u8>, Errors> {
        let path = self.resolve_name(name)?;
        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) => {
                warn!("Error reading poem {:?}: {}", path, e);
                Err(Errors::NotFound(name.to_string()))
            },
        }
    }

    // ---------------------------------------------------------------------------
    // resolve_name:
    // ---------------------------------------------------------------------------
    /** Map a client supplied name to a path that is a direct child of the poems
     * directory.
     *
     * The name must be a single normal path component, and its absolute form
     * must have the poems directory as its parent.  Both checks are lexical and
     * happen before the filesystem is consulted.  The path is then canonicalized
     * so that a symbolic link pointing outside the poems directory is rejected
     * too.  A name that passes the lexical checks but cannot be canonicalized
     * does not exist.
     */
    pub fn resolve_name(&self, name: &str) -> Result<PathBuf, Errors> {
        let invalid = || {
            warn!("Rejected invalid poem name: {:?}", name);
            Errors::InvalidName(name.to_string())
        };

        // Exactly one plain component: no root, no "." or "..", no separators.
        if name.contains('\0') {
            return Err(invalid());
        }
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => (),
            _ => return Err(invalid()),
        }

        // The absolute path's parent must be the poems directory itself.
        let joined = self.poems_dir.join(name);
        let resolved = match joined.absolutize() {
            Ok(p) => p.into_owned(),
            Err(_) => return Err(invalid()),
        };
        if resolved.parent() != Some(self.poems_dir.as_path()) {
            return Err(invalid());
        }

        // Follow links and check again.
        let real = match fs::canonicalize(&resolved) {
            Ok(p) => p,
            Err(_) => return Err(Errors::NotFound(name.to_string())),
        };
        if real.parent() != Some(self.poems_dir.as_path()) {
            return Err(invalid());
        }

        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// normalize_page:
// ---------------------------------------------------------------------------
/** Convert the raw page query value into a page number.  The leading integer
 * is used and anything after it is ignored, so "2abc" and "2.9" are page 2.
 * Missing values, values without leading digits, zero and negative values
 * all mean page 1.  A number too large to represent is past the end of any
 * listing.
 */
pub fn normalize_page(raw: Option<&str>) -> usize {
    let raw = match raw {
        Some(r) => r.trim_start(),
        None => return 1,
    };
    let raw = raw.strip_prefix('+').unwrap_or(raw);

    // Negative numbers have no leading digits and fall through to page 1.
    let end = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let digits = &raw[..end];
    if digits.is_empty() {
        return 1;
    }

    match digits.parse::<usize>() {
        Ok(0) => 1,
        Ok(p) => p,
        Err(_) => usize::MAX,
    }
}
