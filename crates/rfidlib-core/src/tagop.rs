//! Tag operations and singulation filters.
//!
//! A [`TagOp`] describes one operation against a single tag (read a memory
//! range, write data, lock, kill, ...). Operations are plain data: the
//! protocol engine renders them to wire commands, filling in defaults
//! (access password, antenna, protocol) from the parameter registry.
//!
//! A [`TagFilter`] narrows which tag the operation applies to. With no
//! filter, the first tag to singulate is operated on -- recommended only
//! when exactly one tag is known to be in range.

use crate::error::{Error, Result};
use crate::types::TagData;

/// A Gen2 access or kill password.
///
/// The default is the zero password, which unsecured tags accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Gen2Password(pub u32);

/// Gen2 tag memory banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gen2MemBank {
    /// Reserved memory (kill and access passwords).
    Reserved,
    /// EPC memory.
    Epc,
    /// Tag ID memory.
    Tid,
    /// User memory.
    User,
}

impl Gen2MemBank {
    /// The bank's wire code.
    pub fn code(&self) -> u8 {
        match self {
            Gen2MemBank::Reserved => 0,
            Gen2MemBank::Epc => 1,
            Gen2MemBank::Tid => 2,
            Gen2MemBank::User => 3,
        }
    }

    /// Look up a bank by its wire code.
    pub fn from_code(code: u8) -> Option<Gen2MemBank> {
        match code {
            0 => Some(Gen2MemBank::Reserved),
            1 => Some(Gen2MemBank::Epc),
            2 => Some(Gen2MemBank::Tid),
            3 => Some(Gen2MemBank::User),
            _ => None,
        }
    }
}

/// A Gen2 lock/unlock action: a mask selecting which lock bits to touch
/// and the values to set them to.
///
/// The named constructors cover the common cases; arbitrary mask/action
/// pairs can be built directly for combined operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gen2LockAction {
    /// Which lock bits the action applies to.
    pub mask: u16,
    /// The values to set the masked bits to.
    pub action: u16,
}

impl Gen2LockAction {
    /// Lock EPC memory against writes.
    pub const EPC_LOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0030,
        action: 0x0020,
    };

    /// Unlock EPC memory.
    pub const EPC_UNLOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0030,
        action: 0x0000,
    };

    /// Lock user memory against writes.
    pub const USER_LOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0003,
        action: 0x0002,
    };

    /// Unlock user memory.
    pub const USER_UNLOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0003,
        action: 0x0000,
    };

    /// Lock the access password against reads and writes.
    pub const ACCESS_LOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0300,
        action: 0x0200,
    };

    /// Lock the kill password against reads and writes.
    pub const KILL_LOCK: Gen2LockAction = Gen2LockAction {
        mask: 0x0C00,
        action: 0x0800,
    };
}

/// A Gen2 `Select` pre-filter: tags matching (or, inverted, not matching)
/// `mask` at the given bit range of the chosen bank participate in the
/// subsequent inventory or operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gen2Select {
    /// Invert the match sense.
    pub invert: bool,
    /// Memory bank the mask is compared against.
    pub bank: Gen2MemBank,
    /// Bit offset of the comparison window.
    pub bit_pointer: u32,
    /// Length of the comparison window in bits.
    pub bit_length: u8,
    /// Mask bytes, most significant bit first; at least
    /// `ceil(bit_length / 8)` bytes.
    pub mask: Vec<u8>,
}

/// Selects which tag a [`TagOp`] or read applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    /// Match a tag by exact EPC.
    Epc(TagData),
    /// A Gen2 `Select` filter.
    Gen2Select(Gen2Select),
}

/// One operation against a single tag.
///
/// Operations returning data ([`Gen2ReadData`](TagOp::Gen2ReadData),
/// [`Gen2ReadAfterWrite`](TagOp::Gen2ReadAfterWrite), the read form of
/// [`Gen2BlockPermaLock`](TagOp::Gen2BlockPermaLock), and
/// [`Iso6bRead`](TagOp::Iso6bRead)) yield result bytes from
/// [`execute_tag_op`](crate::reader::Reader::execute_tag_op); the rest
/// yield an empty result on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOp {
    /// Read `word_count` 16-bit words from a Gen2 memory bank.
    Gen2ReadData {
        /// Bank to read from.
        bank: Gen2MemBank,
        /// Word address to start at.
        word_address: u32,
        /// Number of words to read.
        word_count: u8,
    },
    /// Write words into a Gen2 memory bank.
    Gen2WriteData {
        /// Bank to write to.
        bank: Gen2MemBank,
        /// Word address to start at.
        word_address: u32,
        /// Words to write.
        data: Vec<u16>,
    },
    /// Write a new EPC into the tag's EPC memory.
    Gen2WriteTag {
        /// The new tag identity.
        epc: TagData,
    },
    /// Apply a lock action.
    Gen2Lock {
        /// The lock bits to change.
        action: Gen2LockAction,
        /// Access password override; the registry default applies when
        /// `None`.
        access_password: Option<Gen2Password>,
    },
    /// Permanently disable the tag.
    Gen2Kill {
        /// The tag's kill password; a zero password cannot kill.
        kill_password: Gen2Password,
    },
    /// Write words using the Gen2 BlockWrite command.
    Gen2BlockWrite {
        /// Bank to write to.
        bank: Gen2MemBank,
        /// Word pointer to start at.
        word_pointer: u32,
        /// Words to write.
        data: Vec<u16>,
    },
    /// Read or permanently lock a range of memory blocks.
    Gen2BlockPermaLock {
        /// `false` reads the current permalock bits, `true` sets them.
        read_lock: bool,
        /// Bank the blocks live in.
        bank: Gen2MemBank,
        /// First block of the range.
        block_pointer: u32,
        /// Number of 16-block units covered.
        block_range: u8,
        /// Lock mask, one word per unit of `block_range`; must be empty
        /// for the read form.
        mask: Vec<u16>,
    },
    /// Erase a range of words using the Gen2 BlockErase command.
    Gen2BlockErase {
        /// Bank to erase in.
        bank: Gen2MemBank,
        /// Word pointer to start at.
        word_pointer: u32,
        /// Number of words to erase.
        word_count: u8,
    },
    /// Write words, then read back a (possibly different) range in a
    /// single singulation.
    Gen2ReadAfterWrite {
        /// Bank to write to.
        write_bank: Gen2MemBank,
        /// Word address to write at.
        write_address: u32,
        /// Words to write.
        write_data: Vec<u16>,
        /// Bank to read from.
        read_bank: Gen2MemBank,
        /// Word address to read at.
        read_address: u32,
        /// Number of words to read back.
        read_word_count: u8,
    },
    /// Read bytes from an ISO 18000-6B tag.
    Iso6bRead {
        /// Byte address to start at.
        byte_address: u8,
        /// Number of bytes to read.
        len: u8,
    },
    /// Write bytes to an ISO 18000-6B tag.
    Iso6bWrite {
        /// Byte address to start at.
        byte_address: u8,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Lock a byte of an ISO 18000-6B tag.
    Iso6bLock {
        /// Byte address to lock.
        byte_address: u8,
    },
}

impl TagOp {
    /// The air protocol this operation speaks.
    pub fn protocol(&self) -> crate::types::TagProtocol {
        match self {
            TagOp::Iso6bRead { .. } | TagOp::Iso6bWrite { .. } | TagOp::Iso6bLock { .. } => {
                crate::types::TagProtocol::Iso180006b
            }
            _ => crate::types::TagProtocol::Gen2,
        }
    }

    /// Whether a successful execution produces result bytes.
    pub fn returns_data(&self) -> bool {
        matches!(
            self,
            TagOp::Gen2ReadData { .. }
                | TagOp::Gen2ReadAfterWrite { .. }
                | TagOp::Iso6bRead { .. }
                | TagOp::Gen2BlockPermaLock {
                    read_lock: false,
                    ..
                }
        )
    }

    /// Validate the operation's arguments locally, before any bytes are
    /// rendered or transmitted.
    pub fn validate(&self) -> Result<()> {
        match self {
            TagOp::Gen2ReadData { word_count, .. } => {
                if *word_count == 0 {
                    return Err(Error::InvalidArgument("read of zero words".into()));
                }
            }
            TagOp::Gen2WriteData { data, .. } | TagOp::Gen2BlockWrite { data, .. } => {
                if data.is_empty() {
                    return Err(Error::InvalidArgument("write of zero words".into()));
                }
            }
            TagOp::Gen2WriteTag { epc } => {
                if epc.epc.is_empty() {
                    return Err(Error::InvalidArgument("empty EPC".into()));
                }
                if epc.epc.len() % 2 != 0 {
                    return Err(Error::InvalidArgument(
                        "EPC must be an even number of bytes".into(),
                    ));
                }
            }
            TagOp::Gen2BlockPermaLock {
                read_lock,
                block_range,
                mask,
                ..
            } => {
                if *block_range == 0 {
                    return Err(Error::InvalidArgument("block range of zero".into()));
                }
                if *read_lock && mask.len() != *block_range as usize {
                    return Err(Error::InvalidArgument(format!(
                        "permalock mask length {} does not match block range {}",
                        mask.len(),
                        block_range
                    )));
                }
                if !*read_lock && !mask.is_empty() {
                    return Err(Error::InvalidArgument(
                        "permalock read form takes no mask".into(),
                    ));
                }
            }
            TagOp::Gen2BlockErase { word_count, .. } => {
                if *word_count == 0 {
                    return Err(Error::InvalidArgument("erase of zero words".into()));
                }
            }
            TagOp::Gen2ReadAfterWrite {
                write_data,
                read_word_count,
                ..
            } => {
                if write_data.is_empty() {
                    return Err(Error::InvalidArgument("write of zero words".into()));
                }
                if *read_word_count == 0 {
                    return Err(Error::InvalidArgument("read-back of zero words".into()));
                }
            }
            TagOp::Iso6bRead { len, .. } => {
                if *len == 0 {
                    return Err(Error::InvalidArgument("read of zero bytes".into()));
                }
            }
            TagOp::Iso6bWrite { data, .. } => {
                if data.is_empty() {
                    return Err(Error::InvalidArgument("write of zero bytes".into()));
                }
            }
            TagOp::Gen2Lock { .. } | TagOp::Gen2Kill { .. } | TagOp::Iso6bLock { .. } => {}
        }
        Ok(())
    }
}
