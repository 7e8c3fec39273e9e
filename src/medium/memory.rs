//! Card held entirely in RAM.
//!
//! Directories and files are kept in insertion order, which is also the
//! enumeration order `read_dir` reports.  Faults can be injected to drive
//! the mount, card-detect and seek failure paths.

use std::cell::Cell;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::rc::Rc;

use super::{not_mounted, CardInfo, CardType, MediumEntry, StorageMedium};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Rc<[u8]>),
}

#[derive(Debug)]
pub struct MemoryMedium {
    nodes:       Vec<(String, Node)>,
    card_size:   u64,
    present:     bool,
    mounted:     bool,
    mount_fault: bool,
    seek_fault:  Rc<Cell<bool>>,
}

impl MemoryMedium {
    /// An empty card with only the root directory.
    pub fn new() -> Self {
        Self {
            nodes:       vec![("/".to_owned(), Node::Dir)],
            card_size:   1 << 30,
            present:     true,
            mounted:     false,
            mount_fault: false,
            seek_fault:  Rc::new(Cell::new(false)),
        }
    }

    /// Add a directory (parents are created as needed).
    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        if let Some(parent) = parent_of(&path) {
            if !self.is_dir(&parent) {
                self.add_dir(&parent);
            }
        }
        if self.find(&path).is_none() {
            self.nodes.push((path, Node::Dir));
        }
        self
    }

    /// Add or replace a file (parents are created as needed).
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> &mut Self {
        let path = normalize(path);
        if let Some(parent) = parent_of(&path) {
            self.add_dir(&parent);
        }
        let node = Node::File(Rc::from(data));
        match self.find(&path) {
            Some(i) => self.nodes[i].1 = node,
            None    => self.nodes.push((path, node)),
        }
        self
    }

    /// Delete a file or an empty directory.  Returns whether anything went;
    /// a directory that still has children is left in place.
    pub fn remove(&mut self, path: &str) -> bool {
        let path = normalize(path);
        if self.nodes.iter().any(|(p, _)| parent_of(p).as_deref() == Some(path.as_str())) {
            return false;
        }
        let before = self.nodes.len();
        self.nodes.retain(|(p, _)| *p != path);
        self.nodes.len() != before
    }

    /// Pull the card out (or put it back).  The driver still mounts, but the
    /// card type reads as `None`.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn set_mount_fault(&mut self, fail: bool) {
        self.mount_fault = fail;
    }

    /// Make every seek on every open file fail, including already-open ones.
    pub fn set_seek_fault(&mut self, fail: bool) {
        self.seek_fault.set(fail);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn find(&self, path: &str) -> Option<usize> {
        self.nodes.iter().position(|(p, _)| p == path)
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(self.find(path).map(|i| &self.nodes[i].1), Some(Node::Dir))
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageMedium for MemoryMedium {
    type File = MemoryFile;
    type Entries = std::vec::IntoIter<io::Result<MediumEntry>>;

    fn mount(&mut self) -> io::Result<()> {
        if self.mount_fault {
            return Err(io::Error::new(io::ErrorKind::Other, "injected mount fault"));
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn card_info(&self) -> CardInfo {
        let kind = if self.mounted && self.present {
            CardType::from_capacity(self.card_size)
        } else {
            CardType::None
        };
        CardInfo { kind, size_bytes: self.card_size }
    }

    fn read_dir(&mut self, path: &str) -> io::Result<Self::Entries> {
        if !self.mounted {
            return Err(not_mounted());
        }
        let path = normalize(path);
        match self.find(&path).map(|i| &self.nodes[i].1) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::new(io::ErrorKind::Other, format!("{path} is not a directory")));
            }
            None => {
                return Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")));
            }
        }
        let entries: Vec<io::Result<MediumEntry>> = self.nodes.iter()
            .filter(|(p, _)| parent_of(p).as_deref() == Some(path.as_str()))
            .map(|(p, node)| Ok(MediumEntry {
                name:   p.rsplit('/').next().unwrap_or(p).to_owned(),
                is_dir: matches!(node, Node::Dir),
                size:   match node {
                    Node::File(data) => data.len() as u64,
                    Node::Dir        => 0,
                },
            }))
            .collect();
        Ok(entries.into_iter())
    }

    fn open(&mut self, path: &str) -> io::Result<MemoryFile> {
        if !self.mounted {
            return Err(not_mounted());
        }
        let path = normalize(path);
        match self.find(&path).map(|i| &self.nodes[i].1) {
            Some(Node::File(data)) => Ok(MemoryFile {
                cursor:     Cursor::new(Rc::clone(data)),
                seek_fault: Rc::clone(&self.seek_fault),
            }),
            Some(Node::Dir) => Err(io::Error::new(io::ErrorKind::Other, format!("{path} is a directory"))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))),
        }
    }
}

/// Read handle onto a [`MemoryMedium`] file.  Shares the file contents, so a
/// handle stays readable even if the file is later removed from the card.
#[derive(Debug)]
pub struct MemoryFile {
    cursor:     Cursor<Rc<[u8]>>,
    seek_fault: Rc<Cell<bool>>,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.seek_fault.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected seek fault"));
        }
        self.cursor.seek(pos)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_owned()),
        Some(i) => Some(path[..i].to_owned()),
        None    => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> MemoryMedium {
        let mut m = MemoryMedium::new();
        m.add_file("/images/b.jpg", &[1, 2, 3])
            .add_file("/images/a.jpg", &[4])
            .add_dir("/images/sub");
        m.mount().unwrap();
        m
    }

    #[test]
    fn lists_children_in_insertion_order() {
        let mut m = card();
        let names: Vec<String> = m.read_dir("/images").unwrap()
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(names, ["b.jpg", "a.jpg", "sub"]);

        let root: Vec<MediumEntry> = m.read_dir("/").unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir);
    }

    #[test]
    fn open_reads_contents() {
        let mut m = card();
        let mut buf = Vec::new();
        m.open("/images/b.jpg").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(m.open("/images/zzz.jpg").unwrap_err().kind(), io::ErrorKind::NotFound);
        assert!(m.read_dir("/images/a.jpg").is_err());
    }

    #[test]
    fn seek_fault_reaches_open_handles() {
        let mut m = card();
        let mut f = m.open("/images/b.jpg").unwrap();
        assert_eq!(f.seek(SeekFrom::Start(1)).unwrap(), 1);
        m.set_seek_fault(true);
        assert!(f.seek(SeekFrom::Start(0)).is_err());
        m.set_seek_fault(false);
        assert!(f.seek(SeekFrom::Start(0)).is_ok());
    }

    #[test]
    fn ejected_card_has_no_type() {
        let mut m = card();
        m.set_present(false);
        assert_eq!(m.card_info().kind, CardType::None);
        assert!(m.remove("/images/a.jpg"));
        assert!(!m.remove("/images/a.jpg"));
    }

    #[test]
    fn remove_keeps_non_empty_directories() {
        let mut m = card();
        assert!(!m.remove("/images"));
        assert_eq!(m.read_dir("/images").unwrap().count(), 3);

        assert!(m.remove("/images/sub"));
        m.remove("/images/a.jpg");
        m.remove("/images/b.jpg");
        assert!(m.remove("/images"));
        assert!(m.read_dir("/images").is_err());
    }

    #[test]
    fn unmounted_card_refuses_access() {
        let mut m = card();
        m.unmount();
        assert!(m.open("/images/b.jpg").is_err());
        assert!(m.read_dir("/images").is_err());
    }
}
