//
// Copyright (c) 2023 ZettaScale Technology
//
// This program and the accompanying materials are made available under the
// terms of the Eclipse Public License 2.0 which is available at
// http://www.eclipse.org/legal/epl-2.0, or the Apache License, Version 2.0
// which is available at https://www.apache.org/licenses/LICENSE-2.0.
//
// SPDX-License-Identifier: EPL-2.0 OR Apache-2.0
//
// Contributors:
//   ZettaScale Zenoh Team, <zenoh@zettascale.tech>
//
//! Codec for the extension-chain tail any message may carry: a sequence
//! of `(1-byte header, body)` tuples, header bit 7 chaining to the next,
//! bit 6 marking mandatory, bits 4..5 the body encoding, bits 0..3 the id.

use zenoh_pico_collections::Bytes;
use zenoh_pico_protocol::extension::{ExtBody, ExtEncoding, Extension, ENC_MASK, ENC_SHIFT, FLAG_MANDATORY, FLAG_MORE, ID_MASK};

use crate::error::CodecResult;
use crate::reader::Reader;
use crate::writer::Writer;

pub fn write_extension(w: &mut Writer, ext: &Extension, more: bool) {
    let mut header = ext.id & ID_MASK;
    if ext.mandatory {
        header |= FLAG_MANDATORY;
    }
    header |= ext.body.encoding().to_bits() << ENC_SHIFT;
    if more {
        header |= FLAG_MORE;
    }
    w.write_u8(header);
    match &ext.body {
        ExtBody::Unit => {}
        ExtBody::ZInt(v) => crate::varint::write_u64(w, *v),
        ExtBody::ZBuf(bytes) => w.write_payload(bytes),
    }
}

pub fn write_extensions(w: &mut Writer, exts: &[Extension]) {
    for (i, ext) in exts.iter().enumerate() {
        write_extension(w, ext, i + 1 < exts.len());
    }
}

/// Decodes the whole trailing extension chain. Bit 7 of each header says
/// whether another extension follows; this loop stops the first time it
/// doesn't.
pub fn read_extensions(r: &mut Reader) -> CodecResult<Vec<Extension>> {
    let mut out = Vec::new();
    loop {
        let header = r.read_u8()?;
        let id = header & ID_MASK;
        let mandatory = header & FLAG_MANDATORY != 0;
        let more = header & FLAG_MORE != 0;
        let encoding = ExtEncoding::from_bits((header >> ENC_SHIFT) & ENC_MASK);
        let body = match encoding {
            ExtEncoding::Unit => ExtBody::Unit,
            ExtEncoding::ZInt => ExtBody::ZInt(crate::varint::read_u64(r)?),
            ExtEncoding::ZBuf => ExtBody::ZBuf(r.read_payload()?),
        };
        out.push(Extension { id, mandatory, body });
        if !more {
            break;
        }
    }
    Ok(out)
}

/// After a message decoder has pulled out the extensions it recognizes
/// (by id), call this with the ids it *didn't* recognize: an unknown
/// extension that was marked mandatory is a decode error (spec §4.2);
/// unknown optional extensions are silently ignored.
pub fn reject_unknown_mandatory(unrecognized: &[&Extension]) -> CodecResult<()> {
    for ext in unrecognized {
        if ext.mandatory {
            return Err(crate::error::CodecError::UnknownMandatoryExtension(ext.id));
        }
    }
    Ok(())
}

pub fn find_zint(exts: &[Extension], id: u8) -> Option<u64> {
    exts.iter().find_map(|e| match (e.id == id, &e.body) {
        (true, ExtBody::ZInt(v)) => Some(*v),
        _ => None,
    })
}

pub fn find_zbuf(exts: &[Extension], id: u8) -> Option<&Bytes> {
    exts.iter().find_map(|e| match (e.id == id, &e.body) {
        (true, ExtBody::ZBuf(b)) => Some(b),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_chain_roundtrips() {
        let exts = vec![
            Extension {
                id: 1,
                mandatory: false,
                body: ExtBody::ZInt(42),
            },
            Extension {
                id: 2,
                mandatory: true,
                body: ExtBody::ZBuf(Bytes::from_buf(vec![1, 2, 3])),
            },
        ];
        let mut w = Writer::new();
        write_extensions(&mut w, &exts);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        let decoded = read_extensions(&mut r).unwrap();
        assert_eq!(decoded, exts);
    }

    #[test]
    fn unknown_mandatory_extension_is_rejected() {
        let ext = Extension {
            id: 9,
            mandatory: true,
            body: ExtBody::Unit,
        };
        assert!(reject_unknown_mandatory(&[&ext]).is_err());
    }

    #[test]
    fn unknown_optional_extension_is_accepted() {
        let ext = Extension {
            id: 9,
            mandatory: false,
            body: ExtBody::Unit,
        };
        assert!(reject_unknown_mandatory(&[&ext]).is_ok());
    }
}
