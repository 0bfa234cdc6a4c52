//! Line-oriented append-only swap file (§4.4).
//!
//! Each record is `<name> <vpage> <v0> <v1> … <v_{FRAME_SIZE-1}>\n`. The spec
//! only requires "last matching record wins" and tolerates an O(file size)
//! scan; per the design note in §9 we keep an in-memory index
//! `(name, vpage) -> byte offset` updated on every append so lookups don't
//! re-scan the file, without changing the on-disk format or its semantics.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct BackingStore {
    path: PathBuf,
    file: File,
    frame_words: usize,
    /// (owner, vpage) -> byte offset of the most recent record.
    index: HashMap<(String, u32), u64>,
}

impl BackingStore {
    pub fn open(path: impl AsRef<Path>, frame_words: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        let mut store = Self { path, file, frame_words, index: HashMap::new() };
        store.rebuild_index()?;
        Ok(store)
    }

    fn rebuild_index(&mut self) -> io::Result<()> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut offset: u64 = 0;
        for line in reader.lines() {
            let line = line?;
            let len = line.len() as u64 + 1; // + newline
            if let Some((name, vpage)) = parse_header(&line) {
                self.index.insert((name, vpage), offset);
            }
            offset += len;
        }
        Ok(())
    }

    /// Append a record, recording its offset in the index (eviction write,
    /// §4.4 step 3).
    pub fn write_page(&mut self, owner: &str, vpage: u32, words: &[u16]) -> io::Result<()> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        let mut line = format!("{owner} {vpage}");
        for w in words.iter().take(self.frame_words) {
            line.push(' ');
            line.push_str(&w.to_string());
        }
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.index.insert((owner.to_string(), vpage), offset);
        Ok(())
    }

    /// Most-recent record for `(owner, vpage)`, or `None` if the page was
    /// never evicted (§4.4 step 4: "absence... leaves the frame
    /// zero-initialised").
    pub fn read_page(&mut self, owner: &str, vpage: u32) -> io::Result<Option<Vec<u16>>> {
        let Some(&offset) = self.index.get(&(owner.to_string(), vpage)) else {
            return Ok(None);
        };
        self.file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(&self.file);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        let words: Vec<u16> = line
            .split_whitespace()
            .skip(2)
            .filter_map(|t| t.parse::<u16>().ok())
            .collect();
        Ok(Some(words))
    }
}

fn parse_header(line: &str) -> Option<(String, u32)> {
    let mut it = line.split_whitespace();
    let name = it.next()?.to_string();
    let vpage = it.next()?.parse::<u32>().ok()?;
    Some((name, vpage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn round_trips_a_written_page() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = BackingStore::open(tmp.path(), 8).unwrap();
        store.write_page("p1", 3, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let words = store.read_page("p1", 3).unwrap().unwrap();
        assert_eq!(words, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn missing_page_is_none() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = BackingStore::open(tmp.path(), 4).unwrap();
        assert!(store.read_page("nobody", 0).unwrap().is_none());
    }

    #[test]
    fn most_recent_write_wins() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = BackingStore::open(tmp.path(), 2).unwrap();
        store.write_page("p1", 0, &[1, 1]).unwrap();
        store.write_page("p1", 0, &[2, 2]).unwrap();
        let words = store.read_page("p1", 0).unwrap().unwrap();
        assert_eq!(words, vec![2, 2]);
    }

    #[test]
    fn index_rebuilds_from_an_existing_file() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut store = BackingStore::open(tmp.path(), 2).unwrap();
            store.write_page("p1", 0, &[9, 9]).unwrap();
        }
        let mut reopened = BackingStore::open(tmp.path(), 2).unwrap();
        assert_eq!(reopened.read_page("p1", 0).unwrap(), Some(vec![9, 9]));
    }
}
