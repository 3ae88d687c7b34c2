// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Minimal BER-TLV helpers for FCI parsing
//!
//! Supports one and two byte tags and short / `81` / `82` length forms,
//! which covers everything returned by Calypso cards on selection.

use alloc::vec::Vec;

/// Read a tag from the start of the buffer, returning `(tag, constructed, length)`
fn read_tag(buff: &[u8]) -> Option<(u16, bool, usize)> {
    let b = *buff.first()?;
    let constructed = b & 0x20 != 0;

    if b & 0x1F == 0x1F {
        let b2 = *buff.get(1)?;
        Some(((b as u16) << 8 | b2 as u16, constructed, 2))
    } else {
        Some((b as u16, constructed, 1))
    }
}

/// Read a length from the start of the buffer, returning `(value, length)`
fn read_len(buff: &[u8]) -> Option<(usize, usize)> {
    match *buff.first()? {
        l if l < 0x80 => Some((l as usize, 1)),
        0x81 => Some((*buff.get(1)? as usize, 2)),
        0x82 => Some(((*buff.get(1)? as usize) << 8 | *buff.get(2)? as usize, 3)),
        _ => None,
    }
}

/// Find the value of the first object matching `tag`, descending into constructed objects
pub fn find(buff: &[u8], tag: u16) -> Option<&[u8]> {
    let mut index = 0;

    while index < buff.len() {
        // Skip inter-object padding
        if buff[index] == 0x00 || buff[index] == 0xFF {
            index += 1;
            continue;
        }

        let (t, constructed, n) = read_tag(&buff[index..])?;
        index += n;

        let (len, n) = read_len(&buff[index..])?;
        index += n;

        let value = buff.get(index..index + len)?;
        index += len;

        if t == tag {
            return Some(value);
        }

        if constructed {
            if let Some(v) = find(value, tag) {
                return Some(v);
            }
        }
    }

    None
}

/// Append a TLV object to the provided buffer
pub fn write(buff: &mut Vec<u8>, tag: u16, value: &[u8]) {
    if tag > 0xFF {
        buff.extend_from_slice(&tag.to_be_bytes());
    } else {
        buff.push(tag as u8);
    }

    match value.len() {
        n if n < 0x80 => buff.push(n as u8),
        n if n <= 0xFF => buff.extend_from_slice(&[0x81, n as u8]),
        n => {
            buff.push(0x82);
            buff.extend_from_slice(&(n as u16).to_be_bytes());
        }
    }

    buff.extend_from_slice(value);
}
