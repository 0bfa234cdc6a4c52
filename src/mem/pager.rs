//! Demand-paged virtual memory with FIFO replacement (§4.4).
//!
//! Per the open question in §9(b), the allocator and the pager are treated
//! as logically independent views sharing only the `MEM_TOTAL` size
//! constant, not a shared byte array — so the pager keeps its own page
//! tables internally (keyed by owner name) rather than reaching into each
//! `Process.page_table` field while holding the pager-wide lock. `System`
//! mirrors the authoritative state back onto `Process.page_table` after a
//! page fault for inspection (`screen -r`, snapshots), preserving the data
//! model in §3 without creating a second lock a worker would need to hold.

use std::collections::{HashMap, VecDeque};
use std::io;

use crate::mem::backing_store::BackingStore;
use crate::process::PageTableEntry;

struct Frame {
    occupied: bool,
    owner: String,
    vpage: u32,
    data: Vec<u16>,
}

pub struct Pager {
    frame_size: usize,
    frame_words: usize,
    frames: Vec<Frame>,
    fifo: VecDeque<usize>,
    page_tables: HashMap<String, HashMap<u32, PageTableEntry>>,
    backing_store: BackingStore,
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
}

impl Pager {
    pub fn new(mem_total: usize, frame_size: usize, backing_store: BackingStore) -> Self {
        let num_frames = mem_total / frame_size;
        let frame_words = frame_size / 2;
        let frames = (0..num_frames)
            .map(|_| Frame { occupied: false, owner: String::new(), vpage: 0, data: vec![0u16; frame_words] })
            .collect();
        Self {
            frame_size,
            frame_words,
            frames,
            fifo: VecDeque::new(),
            page_tables: HashMap::new(),
            backing_store,
            pages_paged_in: 0,
            pages_paged_out: 0,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn vpage_of(&self, address: u32) -> u32 {
        address / self.frame_size as u32
    }

    fn word_index(&self, address: u32) -> usize {
        ((address % self.frame_size as u32) / 2) as usize
    }

    /// §4.4 `ensure_present`. Services a page fault if the owner's page
    /// table has no present entry for the page containing `address`.
    pub fn ensure_present(&mut self, owner: &str, address: u32) -> io::Result<()> {
        let vpage = self.vpage_of(address);
        if self.page_tables.get(owner).and_then(|t| t.get(&vpage)).map(|e| e.present) == Some(true) {
            return Ok(());
        }

        let frame_idx = match self.frames.iter().position(|f| !f.occupied) {
            Some(idx) => idx,
            None => self.evict()?,
        };

        let restored = self.backing_store.read_page(owner, vpage)?;
        {
            let frame = &mut self.frames[frame_idx];
            frame.occupied = true;
            frame.owner = owner.to_string();
            frame.vpage = vpage;
            match restored {
                Some(words) => {
                    for (slot, w) in frame.data.iter_mut().zip(words.into_iter()) {
                        *slot = w;
                    }
                    self.pages_paged_in += 1;
                }
                None => frame.data.iter_mut().for_each(|w| *w = 0),
            }
        }
        self.fifo.push_back(frame_idx);
        self.page_tables
            .entry(owner.to_string())
            .or_default()
            .insert(vpage, PageTableEntry { present: true, frame: frame_idx, dirty: false });
        Ok(())
    }

    /// Evict the FIFO head frame, writing it back and invalidating the
    /// evicted owner's page-table entry. Returns the now-free frame index.
    fn evict(&mut self) -> io::Result<usize> {
        let frame_idx = self
            .fifo
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "frame pool exhausted with empty FIFO"))?;
        let (owner, vpage, data) = {
            let frame = &self.frames[frame_idx];
            (frame.owner.clone(), frame.vpage, frame.data.clone())
        };
        self.backing_store.write_page(&owner, vpage, &data)?;
        if let Some(entry) = self.page_tables.get_mut(&owner).and_then(|t| t.get_mut(&vpage)) {
            entry.present = false;
        }
        self.frames[frame_idx].occupied = false;
        self.pages_paged_out += 1;
        Ok(frame_idx)
    }

    pub fn read_u16(&mut self, owner: &str, address: u32) -> io::Result<u16> {
        self.ensure_present(owner, address)?;
        let vpage = self.vpage_of(address);
        let frame_idx = self.page_tables[owner][&vpage].frame;
        Ok(self.frames[frame_idx].data[self.word_index(address)])
    }

    pub fn write_u16(&mut self, owner: &str, address: u32, value: u16) -> io::Result<()> {
        self.ensure_present(owner, address)?;
        let vpage = self.vpage_of(address);
        let frame_idx = self.page_tables[owner][&vpage].frame;
        let word = self.word_index(address);
        self.frames[frame_idx].data[word] = value;
        if let Some(entry) = self.page_tables.get_mut(owner).and_then(|t| t.get_mut(&vpage)) {
            entry.dirty = true;
        }
        Ok(())
    }

    pub fn page_table_snapshot(&self, name: &str) -> HashMap<u32, PageTableEntry> {
        self.page_tables.get(name).cloned().unwrap_or_default()
    }

    pub fn occupied_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.occupied).count()
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }
}
