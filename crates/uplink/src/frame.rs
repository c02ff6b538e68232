// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Segment header framing
//!
//! Every segment file starts with a framed copy of its record:
//!
//! ```text
//! [4 bytes LE: length L of padded header]
//! [L bytes: canonical JSON, space-padded to a multiple of 4]
//! [arbitrary payload bytes appended by the caller]
//! ```
//!
//! Payload bytes carry no framing of their own; their structure is the
//! producer's concern.

use std::io::Read;

use crate::Result;
use crate::record::MeasurementRecord;

/// The padded header length is always a multiple of this.
pub const HEADER_ALIGN: usize = 4;

const PAD_BYTE: u8 = b' ';

/// Encode `record` as a framed header block: length prefix plus padded JSON.
pub fn encode_header(record: &MeasurementRecord) -> Result<Vec<u8>> {
    let mut body = record.to_canonical_json()?;
    while body.len() % HEADER_ALIGN != 0 {
        body.push(PAD_BYTE);
    }

    let mut block = Vec::with_capacity(4 + body.len());
    block.extend_from_slice(&(body.len() as u32).to_le_bytes());
    block.extend_from_slice(&body);
    Ok(block)
}

/// Read a framed header back, returning the decoded record.
///
/// Leaves `reader` positioned at the first payload byte.
pub fn read_header<R: Read>(reader: &mut R) -> Result<MeasurementRecord> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_le_bytes(prefix) as usize;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    // JSON objects end with '}', so trailing spaces are always padding
    while body.last() == Some(&PAD_BYTE) {
        body.pop();
    }

    Ok(serde_json::from_slice(&body)?)
}
