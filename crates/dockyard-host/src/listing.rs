use std::fmt;
use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

/// One line of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    /// `d`, `-`, `l`, `p`, `s`, `c` or `b`
    pub kind: char,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl DirEntryInfo {
    fn from_metadata(name: String, meta: &fs::Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            'd'
        } else if ft.is_symlink() {
            'l'
        } else if ft.is_fifo() {
            'p'
        } else if ft.is_socket() {
            's'
        } else if ft.is_char_device() {
            'c'
        } else if ft.is_block_device() {
            'b'
        } else {
            '-'
        };
        Self {
            name,
            kind,
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
        }
    }

    /// Permission string in `ls -l` form, e.g. `drwxr-xr-x`.
    pub fn mode_string(&self) -> String {
        let mut s = String::with_capacity(10);
        s.push(self.kind);
        for (shift, special, special_char) in [(6, 0o4000, 's'), (3, 0o2000, 's'), (0, 0o1000, 't')] {
            let bits = (self.mode >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            let exec = bits & 0o1 != 0;
            s.push(match (self.mode & special != 0, exec) {
                (true, true) => special_char,
                (true, false) => special_char.to_ascii_uppercase(),
                (false, true) => 'x',
                (false, false) => '-',
            });
        }
        s
    }
}

/// Post-provisioning listing of the data directory.
#[derive(Debug, Clone)]
pub struct DirListing {
    pub path: PathBuf,
    /// `.` first, then children sorted by name
    pub entries: Vec<DirEntryInfo>,
}

impl DirListing {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let mut entries = vec![DirEntryInfo::from_metadata(".".to_owned(), &meta)];

        let mut children = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = entry.path().symlink_metadata()?;
            children.push(DirEntryInfo::from_metadata(
                entry.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(children);

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// The entry describing the directory itself.
    pub fn root(&self) -> Option<&DirEntryInfo> {
        self.entries.first()
    }
}

impl fmt::Display for DirListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.path.display())?;
        for e in &self.entries {
            writeln!(
                f,
                "{} {:>13} {:>10} {}",
                e.mode_string(),
                format!("{}:{}", e.uid, e.gid),
                e.size,
                e.name
            )?;
        }
        Ok(())
    }
}
