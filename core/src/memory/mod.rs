//! Fixed-size byte arena managed by a buddy allocator.
//!
//! The pool owns a zero-initialised byte buffer and a binary tree of
//! [`Block`] records. Allocation rounds the request up to the smallest
//! power of two that fits (never below [`MIN_BLOCK_SIZE`]), splitting
//! free blocks on demand with a left-first descent. Freeing marks the
//! leaf free and coalesces free sibling leaves on the way back up.
//!
//! Allocation failure is not an error: it returns [`Pointer::NULL`] and
//! the caller decides. Freeing `NULL` or a pointer that no allocated
//! leaf starts at is silently absorbed, which makes `free` idempotent.

use std::fmt;
use std::io;

use tracing::warn;

use crate::errors::{Error, Result};


/// Smallest block the allocator will ever hand out, in bytes.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Opaque handle to an allocation inside a [`Pool`].
///
/// A pointer is a byte offset into the arena and stays valid for the
/// lifetime of the allocation it names.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer(u32);

impl Pointer {
    /// Sentinel for "no allocation".
    pub const NULL: Pointer = Pointer(u32::MAX);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Raw byte offset of this pointer.
    pub fn offset(self) -> u32 {
        self.0
    }

    /// A pointer `bytes` further into the same allocation.
    pub(crate) fn add(self, bytes: usize) -> Pointer {
        Pointer(self.0 + bytes as u32)
    }

    /// Rebuild a pointer from an offset previously stored in the pool.
    pub(crate) fn from_offset(offset: u32) -> Pointer {
        Pointer(offset)
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Pointer(null)")
        } else {
            write!(f, "Pointer({})", self.0)
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One node of the buddy tree, covering `size` bytes starting at `ptr`.
///
/// A block is either a leaf (allocated or available) or has exactly two
/// children that partition its range, the right child absorbing the odd
/// remainder when `size` is not even.
struct Block {
    ptr: u32,
    size: usize,
    free: bool,
    left: Option<Box<Block>>,
    right: Option<Box<Block>>,
}

impl Block {
    fn leaf(ptr: u32, size: usize) -> Block {
        Block {
            ptr,
            size,
            free: true,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Split this block into two halves. Refuses when the block is at
    /// minimum size, allocated, or already subdivided.
    fn split(&mut self) -> bool {
        if self.size <= MIN_BLOCK_SIZE || !self.free || !self.is_leaf() {
            return false;
        }
        let half = self.size / 2;
        self.left = Some(Box::new(Block::leaf(self.ptr, half)));
        self.right = Some(Box::new(Block::leaf(
            self.ptr + half as u32,
            self.size - half,
        )));
        true
    }

    /// Find (or carve out) a free leaf of exactly `target` bytes,
    /// descending left-first. Returns its start offset and marks it
    /// allocated.
    fn allocate_in(&mut self, target: usize) -> Option<u32> {
        if self.is_leaf() {
            if !self.free {
                return None;
            }
            if self.size == target {
                self.free = false;
                return Some(self.ptr);
            }
            if self.size < target || !self.split() {
                return None;
            }
        }
        let left = self.left.as_mut().expect("split block has a left child");
        if let Some(ptr) = left.allocate_in(target) {
            return Some(ptr);
        }
        let right = self.right.as_mut().expect("split block has a right child");
        right.allocate_in(target)
    }

    /// Release the allocation starting at `ptr` somewhere below this
    /// node (which must have children). Coalesces pairs of free sibling
    /// leaves on the way back up so that a matched allocate/free pair
    /// restores the tree to its prior shape.
    fn free_below(&mut self, ptr: u32) {
        {
            let right_start = self.right.as_ref().expect("node has children").ptr;
            let child = if ptr < right_start {
                self.left.as_mut().expect("node has children")
            } else {
                self.right.as_mut().expect("node has children")
            };
            if child.is_leaf() {
                if child.ptr == ptr {
                    child.free = true;
                }
            } else {
                child.free_below(ptr);
            }
        }
        let left = self.left.as_ref().expect("node has children");
        let right = self.right.as_ref().expect("node has children");
        if left.is_leaf() && left.free && right.is_leaf() && right.free {
            self.left = None;
            self.right = None;
            self.free = true;
        }
    }

    fn collect_leaves(&self, out: &mut Vec<(u32, usize, bool)>) {
        if self.is_leaf() {
            out.push((self.ptr, self.size, self.free));
        } else {
            self.left.as_ref().expect("node has children").collect_leaves(out);
            self.right.as_ref().expect("node has children").collect_leaves(out);
        }
    }
}

/// The arena: a contiguous byte buffer plus the buddy tree that
/// partitions it.
pub struct Pool {
    data: Box<[u8]>,
    root: Block,
}

impl Pool {
    /// Create a pool over a zero-filled buffer of `size` bytes.
    pub fn new(size: usize) -> Pool {
        Pool {
            data: vec![0u8; size].into_boxed_slice(),
            root: Block::leaf(0, size),
        }
    }

    /// Byte length of the arena.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// First valid pointer of the arena.
    pub fn begin(&self) -> Pointer {
        Pointer(0)
    }

    /// One past the last valid pointer. Dereferencing it is an error.
    pub fn end(&self) -> Pointer {
        Pointer(self.data.len() as u32)
    }

    /// Round `bytes` up to the block size `allocate` would use for it.
    pub(crate) fn block_size_for(bytes: usize) -> usize {
        bytes.next_power_of_two().max(MIN_BLOCK_SIZE)
    }

    /// Reserve a region of at least `bytes` bytes.
    ///
    /// Returns [`Pointer::NULL`] when no block of sufficient size is
    /// free; the region handed out is exactly
    /// `max(MIN_BLOCK_SIZE, next_power_of_two(bytes))` bytes.
    pub fn allocate(&mut self, bytes: usize) -> Pointer {
        let target = Self::block_size_for(bytes);
        match self.root.allocate_in(target) {
            Some(ptr) => Pointer(ptr),
            None => {
                warn!(requested = bytes, target, "memory pool exhausted");
                Pointer::NULL
            }
        }
    }

    /// Release the allocation identified by `ptr`.
    ///
    /// `NULL`, already-freed, and unknown pointers are no-ops.
    pub fn free(&mut self, ptr: Pointer) {
        if !self.in_range(ptr) {
            return;
        }
        if self.root.is_leaf() {
            if self.root.ptr == ptr.0 {
                self.root.free = true;
            }
            return;
        }
        self.root.free_below(ptr.0);
    }

    fn in_range(&self, ptr: Pointer) -> bool {
        !ptr.is_null() && (ptr.0 as usize) < self.data.len()
    }

    fn check_span(&self, ptr: Pointer, len: usize) -> Result<usize> {
        let start = ptr.0 as usize;
        if ptr.is_null() || start + len > self.data.len() {
            return Err(Error::OutOfRange {
                ptr: ptr.0,
                len,
                size: self.data.len(),
            });
        }
        Ok(start)
    }

    /// Read one byte. Out-of-range access is an error.
    pub fn byte(&self, ptr: Pointer) -> Result<u8> {
        let start = self.check_span(ptr, 1)?;
        Ok(self.data[start])
    }

    /// Borrow `len` bytes starting at `ptr`.
    pub fn bytes(&self, ptr: Pointer, len: usize) -> Result<&[u8]> {
        let start = self.check_span(ptr, len)?;
        Ok(&self.data[start..start + len])
    }

    /// Mutably borrow `len` bytes starting at `ptr`.
    pub fn bytes_mut(&mut self, ptr: Pointer, len: usize) -> Result<&mut [u8]> {
        let start = self.check_span(ptr, len)?;
        Ok(&mut self.data[start..start + len])
    }

    pub fn read_u32(&self, ptr: Pointer) -> Result<u32> {
        let b = self.bytes(ptr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_u32(&mut self, ptr: Pointer, value: u32) -> Result<()> {
        self.bytes_mut(ptr, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn read_u64(&self, ptr: Pointer) -> Result<u64> {
        let b = self.bytes(ptr, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_u64(&mut self, ptr: Pointer, value: u64) -> Result<()> {
        self.bytes_mut(ptr, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Ordered `(offset, size, free)` triples of the current leaves.
    /// The leaves always partition `[0, size)`.
    pub fn leaf_spans(&self) -> Vec<(u32, usize, bool)> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// True when every leaf is free, i.e. nothing is allocated.
    pub fn is_unused(&self) -> bool {
        self.leaf_spans().iter().all(|&(_, _, free)| free)
    }

    /// Hex dump of the arena: 32 bytes per line, grouped by the minimum
    /// block size.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for line in self.data.chunks(32) {
            for (i, group) in line.chunks(MIN_BLOCK_SIZE).enumerate() {
                if i > 0 {
                    write!(out, " ")?;
                }
                for byte in group {
                    write!(out, "{byte:02X}")?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
