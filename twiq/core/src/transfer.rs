//! Single bus transfers and the buffers handed to bus drivers

use core::marker::PhantomData;
use core::ptr::NonNull;

/// Data direction of a transfer, seen from the bus controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Controller transmits to the device
    Write,
    /// Controller receives from the device
    Read,
}

/// Per-transfer option bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferFlags(u8);

impl TransferFlags {
    /// No options
    pub const NONE: TransferFlags = TransferFlags(0);
    /// Do not generate a stop condition after this transfer.
    ///
    /// The bus stays held and the next transfer starts with a repeated start.
    pub const NO_STOP: TransferFlags = TransferFlags(0x01);

    /// Create flags from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        TransferFlags(bits)
    }

    /// Get the raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if all bits of `other` are set
    pub const fn contains(self, other: TransferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combine two flag sets
    pub const fn union(self, other: TransferFlags) -> Self {
        TransferFlags(self.0 | other.0)
    }
}

/// Location and length of a transfer's data, as seen by a bus driver.
///
/// The scheduler never looks at the bytes behind a `TransferBuffer`; it only
/// forwards the descriptor. Drivers that move data (in an interrupt or by DMA)
/// reach the bytes through the `unsafe` accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferBuffer {
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
}

// SAFETY: the descriptor itself is only an address and a length. The bytes are
// borrowed by the owning `Transfer` for its whole lifetime, and dereferencing
// them requires the `unsafe` accessors below.
#[allow(unsafe_code)]
unsafe impl Send for TransferBuffer {}
#[allow(unsafe_code)]
unsafe impl Sync for TransferBuffer {}

#[allow(unsafe_code)]
impl TransferBuffer {
    const fn from_slice(data: &[u8]) -> Self {
        Self {
            // SAFETY: slice pointers are never null, even for empty slices.
            ptr: unsafe { NonNull::new_unchecked(data.as_ptr() as *mut u8) },
            len: data.len(),
            writable: false,
        }
    }

    fn from_mut_slice(data: &mut [u8]) -> Self {
        Self {
            ptr: NonNull::from(&mut *data).cast(),
            len: data.len(),
            writable: true,
        }
    }

    /// Length in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the buffer was borrowed mutably (a read destination)
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Raw pointer to the first byte
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Raw mutable pointer to the first byte, e.g. for a DMA destination register
    pub const fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// View the bytes as a slice.
    ///
    /// # Safety
    /// Only valid between the start call that received this buffer and the
    /// completion event for that transfer. The returned slice must not be kept
    /// past the completion event.
    pub unsafe fn as_slice<'b>(&self) -> &'b [u8] {
        // SAFETY: upheld by the caller; ptr/len come from a live slice borrow.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the bytes as a mutable slice.
    ///
    /// # Safety
    /// Same window as [`as_slice`](Self::as_slice), and only for buffers of read
    /// transfers (see [`is_writable`](Self::is_writable)). No other reference to
    /// the bytes may be live while the returned slice is.
    pub unsafe fn as_mut_slice<'b>(&self) -> &'b mut [u8] {
        debug_assert!(self.writable, "write transfer buffers are read-only");
        // SAFETY: upheld by the caller; the bytes were borrowed mutably by the transfer.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// One directional data movement to a single device address.
///
/// The transfer borrows its buffer for `'a`: the caller cannot touch or free
/// the bytes while any transaction holding this transfer may still run.
#[derive(Debug, Clone, Copy)]
pub struct Transfer<'a> {
    address: u8,
    direction: Direction,
    buffer: TransferBuffer,
    flags: TransferFlags,
    _borrow: PhantomData<&'a mut [u8]>,
}

impl<'a> Transfer<'a> {
    /// Write `data` to the 7-bit device `address`
    pub const fn write(address: u8, data: &'a [u8]) -> Self {
        Self {
            address,
            direction: Direction::Write,
            buffer: TransferBuffer::from_slice(data),
            flags: TransferFlags::NONE,
            _borrow: PhantomData,
        }
    }

    /// Read `buffer.len()` bytes from the 7-bit device `address` into `buffer`
    pub fn read(address: u8, buffer: &'a mut [u8]) -> Self {
        Self {
            address,
            direction: Direction::Read,
            buffer: TransferBuffer::from_mut_slice(buffer),
            flags: TransferFlags::NONE,
            _borrow: PhantomData,
        }
    }

    /// Keep the bus held after this transfer (no stop condition)
    pub const fn no_stop(self) -> Self {
        self.with_flags(TransferFlags::NO_STOP)
    }

    /// Add option bits to this transfer
    pub const fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    /// Target device address (7-bit)
    pub const fn address(&self) -> u8 {
        self.address
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn flags(&self) -> TransferFlags {
        self.flags
    }

    /// Check if the stop condition is suppressed after this transfer
    pub const fn is_no_stop(&self) -> bool {
        self.flags.contains(TransferFlags::NO_STOP)
    }

    /// Number of bytes to move
    pub const fn len(&self) -> usize {
        self.buffer.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer descriptor for the bus driver
    pub const fn buffer(&self) -> TransferBuffer {
        self.buffer
    }

    /// Address byte as it goes on the wire: address in bits 7..1, read bit in bit 0
    pub const fn op(&self) -> u8 {
        let read = match self.direction {
            Direction::Read => 1,
            Direction::Write => 0,
        };
        (self.address << 1) | read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_transfer() {
        let data = [0xAA, 0x55];
        let t = Transfer::write(0x48, &data);

        assert_eq!(t.address(), 0x48);
        assert_eq!(t.direction(), Direction::Write);
        assert_eq!(t.len(), 2);
        assert!(!t.is_no_stop());
        assert!(!t.buffer().is_writable());
        assert_eq!(t.buffer().as_ptr(), data.as_ptr());
    }

    #[test]
    fn test_read_transfer_no_stop() {
        let mut buf = [0u8; 6];
        let t = Transfer::read(0x1E, &mut buf).no_stop();

        assert_eq!(t.direction(), Direction::Read);
        assert!(t.is_no_stop());
        assert!(t.buffer().is_writable());
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn test_op_byte() {
        let mut buf = [0u8; 1];
        assert_eq!(Transfer::write(0x48, &[]).op(), 0x90);
        assert_eq!(Transfer::read(0x48, &mut buf).op(), 0x91);
    }

    #[test]
    fn test_flags() {
        let flags = TransferFlags::NONE.union(TransferFlags::NO_STOP);
        assert!(flags.contains(TransferFlags::NO_STOP));
        assert!(!TransferFlags::NONE.contains(TransferFlags::NO_STOP));
        assert_eq!(TransferFlags::from_bits(0x01), TransferFlags::NO_STOP);
    }

    #[test]
    fn test_const_write_in_static() {
        static INIT: [u8; 2] = [0x20, 0x0F];
        static SEQUENCE: [Transfer<'static>; 1] = [Transfer::write(0x19, &INIT)];

        assert_eq!(SEQUENCE[0].len(), 2);
        assert_eq!(SEQUENCE[0].address(), 0x19);
    }
}
