//! Synthetic message made of independently allocated fields
//!
//! Layout:
//! ┌─────────┬─────────┬─────┬─────────────┐
//! │ field 0 │ field 1 │ ... │ field N - 1 │   (each its own allocation)
//! └─────────┴─────────┴─────┴─────────────┘
//!
//! On the wire the fields appear back to back in field order, no framing.
//! Field `i` is filled with the byte `b'A' + (i % 26)`.

use std::io::IoSlice;

use memmap2::MmapMut;

use crate::error::{Result, TransferError};

/// Sumber alokasi untuk field buffers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldBacking {
    /// Plain heap allocation
    #[default]
    Heap,
    /// Anonymous mmap, page aligned untuk zero-copy
    Mapped,
}

/// Field count and per-field length derived from a requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLayout {
    field_count: usize,
    field_len: usize,
}

impl MessageLayout {
    /// Split `requested` bytes across `field_count` fields, at least one
    /// byte each.
    ///
    /// # Panics
    /// Panics if `field_count` is zero.
    pub fn new(requested: usize, field_count: usize) -> Self {
        assert!(field_count > 0, "field_count must be > 0");
        Self {
            field_count,
            field_len: (requested / field_count).max(1),
        }
    }

    #[inline(always)]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    #[inline(always)]
    pub fn field_len(&self) -> usize {
        self.field_len
    }

    /// Effective message size; may differ from the requested size.
    #[inline(always)]
    pub fn total_len(&self) -> usize {
        self.field_count * self.field_len
    }
}

/// Fill byte for field `index`
#[inline(always)]
pub fn pattern_byte(index: usize) -> u8 {
    b'A' + (index % 26) as u8
}

enum Field {
    Heap(Box<[u8]>),
    Mapped(MmapMut),
}

impl Field {
    fn allocate(len: usize, fill: u8, backing: FieldBacking) -> Result<Self> {
        match backing {
            FieldBacking::Heap => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(len)
                    .map_err(|_| TransferError::Allocation { requested: len })?;
                buf.resize(len, fill);
                Ok(Field::Heap(buf.into_boxed_slice()))
            }
            FieldBacking::Mapped => {
                let mut map = MmapMut::map_anon(len)
                    .map_err(|_| TransferError::Allocation { requested: len })?;
                map.fill(fill);
                Ok(Field::Mapped(map))
            }
        }
    }

    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        match self {
            Field::Heap(buf) => &buf[..],
            Field::Mapped(map) => &map[..],
        }
    }
}

/// One connection's payload. Owned by exactly one handler.
pub struct Message {
    layout: MessageLayout,
    fields: Vec<Field>,
}

impl Message {
    /// Allocate and fill all fields.
    ///
    /// Fails with [`TransferError::Allocation`] if any buffer cannot be
    /// obtained; already allocated fields are released on the way out.
    pub fn create(requested: usize, field_count: usize, backing: FieldBacking) -> Result<Self> {
        let layout = MessageLayout::new(requested, field_count);

        let mut fields = Vec::new();
        fields
            .try_reserve_exact(field_count)
            .map_err(|_| TransferError::Allocation {
                requested: field_count * std::mem::size_of::<Field>(),
            })?;

        for i in 0..field_count {
            fields.push(Field::allocate(layout.field_len(), pattern_byte(i), backing)?);
        }

        Ok(Self { layout, fields })
    }

    #[inline(always)]
    pub fn layout(&self) -> MessageLayout {
        self.layout
    }

    #[inline(always)]
    pub fn total_len(&self) -> usize {
        self.layout.total_len()
    }

    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(Field::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.fields.iter().map(Field::as_slice)
    }

    /// Copy all fields, in order, into one new contiguous buffer.
    ///
    /// This is "copy 1" of the two-copy path.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let total = self.total_len();
        let mut buf = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| TransferError::Allocation { requested: total })?;
        for field in self.fields() {
            buf.extend_from_slice(field);
        }
        Ok(buf)
    }

    /// Scatter-gather list dengan satu descriptor per field. Tidak ada copy.
    pub fn io_slices(&self) -> Vec<IoSlice<'_>> {
        self.fields().map(IoSlice::new).collect()
    }

    /// Release every field buffer.
    ///
    /// Takes `self` so a message cannot be destroyed twice.
    pub fn destroy(self) {
        drop(self);
    }

    /// Give up every field buffer without freeing it.
    ///
    /// Pages behind an unacknowledged zero-copy send may still be read by
    /// the kernel, so they stay allocated until the process exits.
    pub fn leak(self) {
        std::mem::forget(self);
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("field_count", &self.layout.field_count())
            .field("field_len", &self.layout.field_len())
            .finish()
    }
}
