//! Flash translation layer: logical block address to physical page mapping.
//!
//! Writes are placed out of place by a round-robin allocator that walks the
//! pages of die 0 block by block and wraps back to block 0 after the last
//! block. Overwrites simply repoint the LBA; the previous page is never
//! reclaimed (no garbage collection, no wear leveling).

use std::collections::HashMap;
use std::fmt;

/// Physical page address: the die/block/page triple where data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PhysicalPage {
    pub die: u32,
    pub block: u32,
    pub page: u32,
}

impl PhysicalPage {
    /// Returned by [`Ftl::map_read`] for an LBA that was never written.
    /// Identical to the first page the allocator hands out.
    pub const UNMAPPED: PhysicalPage = PhysicalPage {
        die: 0,
        block: 0,
        page: 0,
    };

    pub const fn new(die: u32, block: u32, page: u32) -> Self {
        Self { die, block, page }
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}/b{}/p{}", self.die, self.block, self.page)
    }
}

/// L2P mapping table plus the write allocator cursor.
#[derive(Debug, Clone)]
pub struct Ftl {
    blocks_per_die: u32,
    pages_per_block: u32,
    next_block: u32,
    next_page: u32,
    l2p: HashMap<u64, PhysicalPage>,
}

impl Ftl {
    /// Create an FTL over `blocks_per_die × pages_per_block` pages.
    ///
    /// # Panics
    /// Panics if either dimension is zero. [`crate::SimConfig::validate`]
    /// rejects such configs before they reach here.
    pub fn new(blocks_per_die: u32, pages_per_block: u32) -> Self {
        Self::with_capacity(blocks_per_die, pages_per_block, 0)
    }

    /// Like [`Ftl::new`], pre-sizing the mapping table for `capacity` LBAs.
    ///
    /// The hint is advisory: if the table cannot be reserved up front it
    /// starts empty and grows on demand.
    pub fn with_capacity(blocks_per_die: u32, pages_per_block: u32, capacity: usize) -> Self {
        assert!(
            blocks_per_die > 0 && pages_per_block > 0,
            "FTL geometry must be non-zero"
        );
        let mut l2p = HashMap::new();
        if let Err(e) = l2p.try_reserve(capacity) {
            log::warn!("cannot pre-size L2P table for {capacity} entries ({e}), growing on demand");
        }
        Self {
            blocks_per_die,
            pages_per_block,
            next_block: 0,
            next_page: 0,
            l2p,
        }
    }

    /// Allocate the next page for `lba`, replacing any previous mapping.
    pub fn map_write(&mut self, lba: u64) -> PhysicalPage {
        let ppa = PhysicalPage::new(0, self.next_block, self.next_page);
        self.l2p.insert(lba, ppa);
        self.advance();
        ppa
    }

    /// Current mapping for `lba`, or [`PhysicalPage::UNMAPPED`].
    pub fn map_read(&self, lba: u64) -> PhysicalPage {
        self.lookup(lba).unwrap_or(PhysicalPage::UNMAPPED)
    }

    /// Current mapping for `lba`, `None` if it was never written.
    pub fn lookup(&self, lba: u64) -> Option<PhysicalPage> {
        self.l2p.get(&lba).copied()
    }

    /// Number of LBAs with a mapping.
    pub fn mapped_count(&self) -> usize {
        self.l2p.len()
    }

    /// Page the next `map_write` will return, as `(block, page)`.
    pub fn cursor(&self) -> (u32, u32) {
        (self.next_block, self.next_page)
    }

    pub fn blocks_per_die(&self) -> u32 {
        self.blocks_per_die
    }

    pub fn pages_per_block(&self) -> u32 {
        self.pages_per_block
    }

    fn advance(&mut self) {
        self.next_page += 1;
        if self.next_page >= self.pages_per_block {
            self.next_page = 0;
            self.next_block = (self.next_block + 1) % self.blocks_per_die;
        }
    }
}
