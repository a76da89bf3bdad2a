use crate::crypto::{hash, Hash32};

/// A transaction as submitted over the broadcast endpoint.
///
/// Quarry treats the payload as opaque. Validation stops at shape and
/// size; interpreting the binary is downstream work.
#[derive(Debug, PartialEq, Clone)]
pub struct Transaction {
    timestamp: u64,
    binary: Vec<u8>,
    aux_data: Vec<u8>,
}

impl Transaction {
    pub fn new(timestamp: u64, binary: Vec<u8>, aux_data: Vec<u8>) -> Transaction {
        Transaction {
            timestamp,
            binary,
            aux_data,
        }
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_binary(&self) -> &[u8] {
        &self.binary
    }

    pub fn get_aux_data(&self) -> &[u8] {
        &self.aux_data
    }

    /// Content-derived identifier. Two submissions with identical fields
    /// share an id, which is what the mempool de-duplicates on.
    pub fn get_hash(&self) -> Hash32 {
        let mut vbytes: Vec<u8> = vec![];
        vbytes.extend(&self.timestamp.to_be_bytes());
        vbytes.extend(&self.binary);
        vbytes.extend(&self.aux_data);
        hash(&vbytes)
    }
}
