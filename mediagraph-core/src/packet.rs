//! Encoded packets and their buffers
//!
//! A packet's payload lives in one of three places:
//!
//! - nowhere (an empty packet, possibly still carrying side data),
//! - the owning encoder's grow-only [`ScratchBuffer`], which is reused for
//!   every packet and never handed out,
//! - a reference-counted buffer ([`BytesMut`] while exclusively owned,
//!   [`Bytes`] once shared).
//!
//! Every payload is followed by [`PADDING`] zero bytes so that readers with
//! wide loads may overrun the end safely. Scratch-backed packets must be
//! promoted with [`ScratchBuffer::make_refcounted`] before they leave the
//! encoder.

use bitflags::bitflags;
use bytes::{Bytes, BytesMut};
use std::fmt;

use crate::error::{MediaError, MediaResult};

/// Number of zero bytes following every packet payload
pub const PADDING: usize = 64;

/// Largest payload size accepted by the allocation functions
pub const MAX_PACKET_SIZE: i64 = i32::MAX as i64 - PADDING as i64;

/// Validate a requested payload size
pub fn check_packet_size(size: i64) -> MediaResult<usize> {
    if size < 0 || size > MAX_PACKET_SIZE {
        return Err(MediaError::InvalidSize {
            size,
            max: MAX_PACKET_SIZE,
        });
    }
    Ok(size as usize)
}

bitflags! {
    /// Packet flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// Packet can be decoded without reference to other packets
        const KEY = 0x0001;
        /// Packet content is known to be damaged
        const CORRUPT = 0x0002;
        /// Packet is only needed to prime the decoder and should be dropped
        const DISCARD = 0x0004;
        /// No other packet references this one
        const DISPOSABLE = 0x0010;
    }
}

/// Kind of side data attached to a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideDataType {
    /// Replacement codec extradata
    NewExtradata,
    /// Samples to skip at the start or end of the decoded frame
    SkipSamples,
    /// Encoder quality statistics
    QualityStats,
}

/// Side data attached to a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideData {
    /// Side data kind
    pub kind: SideDataType,
    /// Payload
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
enum Storage {
    #[default]
    Empty,
    Scratch,
    Writable(BytesMut),
    Shared(Bytes),
}

/// An encoded packet
#[derive(Default)]
pub struct Packet {
    storage: Storage,
    size: usize,
    /// Presentation timestamp in the encoder time base
    pub pts: Option<i64>,
    /// Decoding timestamp in the encoder time base
    pub dts: Option<i64>,
    /// Duration in the encoder time base, 0 when unknown
    pub duration: i64,
    /// Packet flags
    pub flags: PacketFlags,
    /// Attached side data
    pub side_data: Vec<SideData>,
}

impl Packet {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reference-counted packet holding a copy of `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        let mut buf = BytesMut::zeroed(data.len() + PADDING);
        buf[..data.len()].copy_from_slice(data);
        Self {
            storage: Storage::Writable(buf),
            size: data.len(),
            ..Self::default()
        }
    }

    /// Payload size in bytes, padding excluded
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the packet carries a payload
    pub fn has_data(&self) -> bool {
        !matches!(self.storage, Storage::Empty)
    }

    /// Whether the packet carries neither payload nor side data
    pub fn is_empty(&self) -> bool {
        !self.has_data() && self.side_data.is_empty()
    }

    /// Whether the payload lives in a reference-counted buffer
    pub fn is_refcounted(&self) -> bool {
        matches!(self.storage, Storage::Writable(_) | Storage::Shared(_))
    }

    /// Whether the payload lives in an encoder scratch buffer
    pub fn is_scratch(&self) -> bool {
        matches!(self.storage, Storage::Scratch)
    }

    /// Whether the payload may be modified in place
    ///
    /// A reference-counted buffer is writable only while this packet holds
    /// the sole reference to it.
    pub fn is_writable(&self) -> bool {
        match &self.storage {
            Storage::Writable(_) => true,
            Storage::Shared(buf) => buf.is_unique(),
            Storage::Empty | Storage::Scratch => false,
        }
    }

    /// Payload bytes
    ///
    /// Scratch-backed payloads are only reachable through the owning
    /// [`ScratchBuffer`]; for those this returns an empty slice.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Writable(buf) => &buf[..self.size],
            Storage::Shared(buf) => &buf[..self.size],
            Storage::Empty | Storage::Scratch => &[],
        }
    }

    /// The padding bytes following a reference-counted payload
    pub fn padding(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Writable(buf) => Some(&buf[self.size..]),
            Storage::Shared(buf) => Some(&buf[self.size..]),
            Storage::Empty | Storage::Scratch => None,
        }
    }

    /// Mutable access to the payload, copying it first if it is shared
    pub fn make_writable(&mut self) -> MediaResult<&mut [u8]> {
        let storage = std::mem::take(&mut self.storage);
        self.storage = match storage {
            Storage::Shared(buf) => match buf.try_into_mut() {
                Ok(owned) => Storage::Writable(owned),
                Err(shared) => {
                    let mut copy = BytesMut::zeroed(shared.len());
                    copy[..self.size].copy_from_slice(&shared[..self.size]);
                    Storage::Writable(copy)
                }
            },
            Storage::Scratch => {
                self.storage = Storage::Scratch;
                return Err(MediaError::invalid_argument(
                    "scratch-backed packet must be made reference-counted first",
                ));
            }
            other => other,
        };
        Ok(self.writable_payload())
    }

    /// Create a new reference to this packet's payload
    ///
    /// Both packets share the buffer afterwards, so neither is writable in
    /// place until the other one is dropped.
    pub fn try_ref(&mut self) -> MediaResult<Packet> {
        let storage = match std::mem::take(&mut self.storage) {
            Storage::Writable(buf) => {
                let shared = buf.freeze();
                self.storage = Storage::Shared(shared.clone());
                Storage::Shared(shared)
            }
            Storage::Shared(shared) => {
                self.storage = Storage::Shared(shared.clone());
                Storage::Shared(shared)
            }
            Storage::Empty => Storage::Empty,
            Storage::Scratch => {
                self.storage = Storage::Scratch;
                return Err(MediaError::invalid_argument(
                    "scratch-backed packet cannot be referenced",
                ));
            }
        };
        Ok(Packet {
            storage,
            size: self.size,
            pts: self.pts,
            dts: self.dts,
            duration: self.duration,
            flags: self.flags,
            side_data: self.side_data.clone(),
        })
    }

    /// Reduce the payload size, re-zeroing the padding after the new end
    pub fn shrink(&mut self, size: usize) -> MediaResult<()> {
        if size > self.size {
            return Err(MediaError::invalid_argument(format!(
                "cannot shrink a {} byte packet to {} bytes",
                self.size, size
            )));
        }
        if self.is_refcounted() {
            let old = self.size;
            self.make_writable()?;
            if let Storage::Writable(buf) = &mut self.storage {
                buf[size..old].fill(0);
                buf.truncate(size + PADDING);
            }
        }
        self.size = size;
        Ok(())
    }

    /// Attach side data
    pub fn add_side_data(&mut self, kind: SideDataType, data: Vec<u8>) {
        self.side_data.push(SideData { kind, data });
    }

    /// Drop the payload and reset every field
    pub fn reset(&mut self) {
        *self = Packet::default();
    }

    /// Turn an exclusively owned buffer into a shared one
    pub fn freeze(&mut self) {
        self.storage = match std::mem::take(&mut self.storage) {
            Storage::Writable(buf) => Storage::Shared(buf.freeze()),
            other => other,
        };
    }

    fn writable_payload(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Writable(buf) => &mut buf[..self.size],
            _ => &mut [],
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match &self.storage {
            Storage::Empty => "empty",
            Storage::Scratch => "scratch",
            Storage::Writable(_) => "writable",
            Storage::Shared(_) => "shared",
        };
        f.debug_struct("Packet")
            .field("storage", &storage)
            .field("size", &self.size)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("duration", &self.duration)
            .field("flags", &self.flags)
            .field("side_data", &self.side_data.len())
            .finish()
    }
}

// ============================================================================
// ALLOCATION
// ============================================================================

/// Source of reference-counted packet buffers
///
/// An allocator must return a buffer of exactly the requested length. The
/// buffer is owned by the packet afterwards; its contents need not be
/// initialised, the caller overwrites the payload and zeroes the padding.
pub trait BufferAllocator: Send + Sync + fmt::Debug {
    /// Allocate a buffer of `len` bytes
    fn allocate(&self, len: usize) -> MediaResult<BytesMut>;
}

/// Heap allocator returning zeroed buffers
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl BufferAllocator for DefaultAllocator {
    fn allocate(&self, len: usize) -> MediaResult<BytesMut> {
        Ok(BytesMut::zeroed(len))
    }
}

/// Give `packet` a reference-counted payload of `size` bytes
///
/// The packet must not carry a payload yet. The buffer comes from
/// `allocator` and is checked for the right length; a mismatch means the
/// allocator breaks its contract and is reported as a configuration error.
pub fn alloc_refcounted<'a>(
    allocator: &dyn BufferAllocator,
    packet: &'a mut Packet,
    size: i64,
) -> MediaResult<&'a mut [u8]> {
    let size = check_packet_size(size)?;
    if packet.has_data() {
        return Err(MediaError::invalid_argument(
            "packet already carries a payload",
        ));
    }
    let len = size + PADDING;
    let mut buf = allocator.allocate(len)?;
    if buf.len() != len {
        tracing::error!(
            "buffer allocator returned {} bytes, expected {}",
            buf.len(),
            len
        );
        return Err(MediaError::configuration(format!(
            "buffer allocator returned {} bytes for a {} byte request",
            buf.len(),
            len
        )));
    }
    buf[size..].fill(0);
    packet.storage = Storage::Writable(buf);
    packet.size = size;
    Ok(packet.writable_payload())
}

/// Grow-only buffer holding at most one in-flight packet payload
///
/// Allocating from the scratch buffer avoids a fresh allocation for every
/// packet; the payload is copied out once the codec has finished writing.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
}

impl ScratchBuffer {
    /// Create an empty scratch buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Current capacity in bytes, padding included
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Back `packet` by `size` bytes of scratch memory
    ///
    /// The buffer only ever grows. The [`PADDING`] bytes after the payload
    /// are zeroed on every call.
    pub fn alloc_packet(&mut self, packet: &mut Packet, size: i64) -> MediaResult<&mut [u8]> {
        let size = check_packet_size(size)?;
        if packet.has_data() {
            return Err(MediaError::invalid_argument(
                "packet already carries a payload",
            ));
        }
        let needed = size + PADDING;
        if self.buf.len() < needed {
            self.buf
                .try_reserve(needed - self.buf.len())
                .map_err(|_| MediaError::ResourceExhausted {
                    resource: format!("{} byte scratch buffer", needed),
                })?;
            self.buf.resize(needed, 0);
        }
        self.buf[size..needed].fill(0);
        packet.storage = Storage::Scratch;
        packet.size = size;
        Ok(&mut self.buf[..size])
    }

    /// Payload of a scratch-backed packet
    pub fn packet_data<'a>(&'a self, packet: &'a Packet) -> &'a [u8] {
        if packet.is_scratch() {
            &self.buf[..packet.size]
        } else {
            packet.data()
        }
    }

    /// Promote a scratch-backed packet to a reference-counted buffer
    ///
    /// Packets that are empty or already reference-counted are left alone.
    pub fn make_refcounted(
        &self,
        allocator: &dyn BufferAllocator,
        packet: &mut Packet,
    ) -> MediaResult<()> {
        if !packet.is_scratch() {
            return Ok(());
        }
        let size = packet.size;
        packet.storage = Storage::Empty;
        packet.size = 0;
        let payload = alloc_refcounted(allocator, packet, size as i64)?;
        payload.copy_from_slice(&self.buf[..size]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ShortAllocator;

    impl BufferAllocator for ShortAllocator {
        fn allocate(&self, len: usize) -> MediaResult<BytesMut> {
            Ok(BytesMut::zeroed(len.saturating_sub(1)))
        }
    }

    #[test]
    fn test_size_checks() {
        assert!(check_packet_size(-1).is_err());
        assert!(check_packet_size(MAX_PACKET_SIZE + 1).is_err());
        assert_eq!(check_packet_size(0).unwrap(), 0);
        assert_eq!(
            check_packet_size(MAX_PACKET_SIZE).unwrap(),
            MAX_PACKET_SIZE as usize
        );
    }

    #[test]
    fn test_refcounted_allocation_zeroes_padding() {
        let mut pkt = Packet::new();
        let payload = alloc_refcounted(&DefaultAllocator, &mut pkt, 10).unwrap();
        payload.fill(0xaa);
        assert!(pkt.is_refcounted());
        assert_eq!(pkt.data(), &[0xaa; 10]);
        assert_eq!(pkt.padding().unwrap(), &[0u8; PADDING][..]);
    }

    #[test]
    fn test_allocator_size_mismatch_is_configuration_error() {
        let mut pkt = Packet::new();
        let err = alloc_refcounted(&ShortAllocator, &mut pkt, 16).unwrap_err();
        assert!(matches!(err, MediaError::Configuration { .. }));
        assert!(!pkt.has_data());
    }

    #[test]
    fn test_alloc_requires_empty_packet() {
        let mut pkt = Packet::copy_from_slice(b"abc");
        assert!(alloc_refcounted(&DefaultAllocator, &mut pkt, 4).is_err());
        let mut scratch = ScratchBuffer::new();
        assert!(scratch.alloc_packet(&mut pkt, 4).is_err());
    }

    #[test]
    fn test_scratch_is_grow_only() {
        let mut scratch = ScratchBuffer::new();
        let mut pkt = Packet::new();
        scratch.alloc_packet(&mut pkt, 100).unwrap().fill(1);
        assert_eq!(scratch.capacity(), 100 + PADDING);

        pkt.reset();
        scratch.alloc_packet(&mut pkt, 10).unwrap();
        assert_eq!(scratch.capacity(), 100 + PADDING);
        assert!(scratch.buf[10..10 + PADDING].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_make_refcounted_copies_scratch() {
        let mut scratch = ScratchBuffer::new();
        let mut pkt = Packet::new();
        scratch
            .alloc_packet(&mut pkt, 4)
            .unwrap()
            .copy_from_slice(b"data");
        assert!(pkt.is_scratch());
        assert!(pkt.data().is_empty());
        assert_eq!(scratch.packet_data(&pkt), b"data");

        scratch.make_refcounted(&DefaultAllocator, &mut pkt).unwrap();
        assert!(pkt.is_refcounted());
        assert_eq!(pkt.data(), b"data");
        assert_eq!(pkt.padding().unwrap().len(), PADDING);
    }

    #[test]
    fn test_writable_only_while_unique() {
        let mut pkt = Packet::copy_from_slice(b"abcd");
        assert!(pkt.is_writable());

        let other = pkt.try_ref().unwrap();
        assert!(!pkt.is_writable());
        assert!(!other.is_writable());

        drop(other);
        assert!(pkt.is_writable());
        pkt.make_writable().unwrap()[0] = b'z';
        assert_eq!(pkt.data(), b"zbcd");
    }

    #[test]
    fn test_make_writable_copies_shared_buffer() {
        let mut pkt = Packet::copy_from_slice(b"abcd");
        let other = pkt.try_ref().unwrap();
        pkt.make_writable().unwrap()[0] = b'z';
        assert_eq!(pkt.data(), b"zbcd");
        assert_eq!(other.data(), b"abcd");
    }

    #[test]
    fn test_shrink_rezeroes_padding() {
        let mut pkt = Packet::copy_from_slice(&[7u8; 8]);
        pkt.shrink(3).unwrap();
        assert_eq!(pkt.data(), &[7u8; 3]);
        assert_eq!(pkt.padding().unwrap(), &[0u8; PADDING][..]);
        assert!(pkt.shrink(4).is_err());
    }

    #[test]
    fn test_side_data_only_packet() {
        let mut pkt = Packet::new();
        pkt.add_side_data(SideDataType::NewExtradata, vec![1, 2]);
        assert!(!pkt.has_data());
        assert!(!pkt.is_empty());
        pkt.reset();
        assert!(pkt.is_empty());
    }
}
