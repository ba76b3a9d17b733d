use core::fmt::{self, Display, Formatter};

use super::{Frame, Packet, FRAME_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    BufferFull { requested: usize, available: usize },
    Encode,
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::BufferFull {
                requested,
                available,
            } => write!(
                f,
                "command buffer full ({requested} bytes requested, {available} available)"
            ),
            CommandError::Encode => write!(f, "command encoding failed"),
        }
    }
}

/// Hub-side staging area for packets waiting for the next ACK of one node.
///
/// The buffer holds commands for a single node at a time; queueing for
/// another node discards everything staged so far.
pub struct CommandBuffer {
    node: Option<u8>,
    buf: [u8; FRAME_CAPACITY],
    len: usize,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    pub const fn new() -> Self {
        Self {
            node: None,
            buf: [0; FRAME_CAPACITY],
            len: 0,
        }
    }

    /// Node the staged commands are addressed to.
    pub fn target(&self) -> Option<u8> {
        self.node
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn available(&self) -> usize {
        FRAME_CAPACITY - self.len
    }

    pub fn reset(&mut self) {
        self.node = None;
        self.len = 0;
    }

    /// Carves `size` bytes for `node` at the end of the buffer.
    pub fn reserve(&mut self, node: u8, size: usize) -> Result<&mut [u8], CommandError> {
        if self.node != Some(node) {
            self.reset();
        }
        let available = self.available();
        if size > available {
            return Err(CommandError::BufferFull {
                requested: size,
                available,
            });
        }
        self.node = Some(node);
        let start = self.len;
        self.len += size;
        Ok(&mut self.buf[start..self.len])
    }

    pub fn queue(&mut self, node: u8, packet: &Packet) -> Result<(), CommandError> {
        let slot = self.reserve(node, packet.encoded_len())?;
        packet.encode(slot).map_err(|_| CommandError::Encode)?;
        Ok(())
    }

    /// Takes the staged commands when `node` is the one they are addressed
    /// to. `None` means a bare ACK.
    pub fn flush_on_ack(&mut self, node: u8) -> Option<Frame> {
        if self.node != Some(node) || self.is_empty() {
            return None;
        }
        let frame = Frame::from_slice(&self.buf[..self.len]).ok();
        self.reset();
        frame
    }
}
