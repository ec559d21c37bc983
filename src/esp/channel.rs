//! FreeRTOS message buffer channel.
//!
//! One message per send: the buffer takes the whole run or nothing.
//!
//! Stream buffers allow a single writer at a time. Writers are serialized
//! by a per-channel [`SendGate`], not by masking interrupts, so the copy
//! into the buffer never runs inside the global critical section.

use core::ffi::c_void;

use esp_idf_svc::sys::{
    vStreamBufferDelete, xStreamBufferGenericCreate, xStreamBufferReceive,
    xStreamBufferSendFromISR, BaseType_t, StreamBufferHandle_t, TickType_t,
};

use crate::error::NetLogError;
use crate::registry::{LogChannel, SendGate};

/// Retries on the send gate before a send is refused.
const SEND_SPINS: u32 = 1000;

/// Bounded byte channel between the engine and one transport worker.
pub struct MessageBufferChannel {
    handle: StreamBufferHandle_t,
    item_size: usize,
    gate: SendGate,
}

// SAFETY: FreeRTOS stream buffers are safe to use from any task or ISR as
// long as writers are serialized (`gate`) and there is a single
// reader (the transport worker).
unsafe impl Send for MessageBufferChannel {}
unsafe impl Sync for MessageBufferChannel {}

impl MessageBufferChannel {
    /// Allocate a message buffer of `capacity` bytes carrying items of at
    /// most `item_size` bytes.
    pub fn new(capacity: usize, item_size: usize) -> Result<Self, NetLogError> {
        // SAFETY: plain allocation call; a null handle is checked below.
        let handle = unsafe { xStreamBufferGenericCreate(capacity, 0, 1, None, None) };
        if handle.is_null() {
            return Err(NetLogError::ChannelAlloc);
        }
        Ok(Self {
            handle,
            item_size,
            gate: SendGate::new(),
        })
    }

    /// Block up to `ticks` for the next item. Returns its length, 0 on timeout.
    ///
    /// Only the transport worker calls this. Pass
    /// `esp_idf_svc::hal::delay::BLOCK` to wait forever.
    pub fn receive(&self, buf: &mut [u8], ticks: TickType_t) -> usize {
        // SAFETY: `buf` is valid for `buf.len()` bytes; single reader.
        unsafe {
            xStreamBufferReceive(
                self.handle,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                ticks,
            )
        }
    }
}

impl LogChannel for MessageBufferChannel {
    fn try_send(&self, bytes: &[u8]) -> usize {
        let Some(_writer) = self.gate.try_enter(SEND_SPINS) else {
            return 0;
        };
        let mut woken: BaseType_t = 0;
        // SAFETY: `_writer` makes us the only writer; the ISR variant never
        // blocks, so it is legal from task or ISR context.
        unsafe {
            xStreamBufferSendFromISR(
                self.handle,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                &mut woken,
            )
        }
    }

    fn max_item_size(&self) -> usize {
        self.item_size
    }
}

impl Drop for MessageBufferChannel {
    fn drop(&mut self) {
        // SAFETY: handle came from xStreamBufferGenericCreate and is not
        // shared past the owner's lifetime.
        unsafe { vStreamBufferDelete(self.handle) }
    }
}
