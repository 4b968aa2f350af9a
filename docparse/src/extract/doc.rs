//! Word 97-2003 (.doc) text extraction.
//!
//! A .doc file is an OLE compound document. Text lives in the `WordDocument` stream, but it is
//! not contiguous: the piece table (the `Clx` structure, stored in the `0Table` or `1Table`
//! stream) maps character positions to byte ranges, each either UTF-16LE or "compressed"
//! 8-bit Windows-1252.
//!
//! Reference: [MS-DOC] 2.5.1 (Fib), 2.9.38 (Clx), 2.9.177 (Pcd).

use std::io::{Cursor, Read, Seek};

use cfb::CompoundFile;
use encoding_rs::WINDOWS_1252;

use super::ExtractError;

const FIB_IDENT: u16 = 0xA5EC;
const FIB_MIN_LEN: usize = 0x01AA;

const OFFSET_FLAGS: usize = 0x000A;
const OFFSET_CCP_TEXT: usize = 0x004C;
const OFFSET_FC_CLX: usize = 0x01A2;
const OFFSET_LCB_CLX: usize = 0x01A6;

const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE: u16 = 0x0200;

const PCD_COMPRESSED: u32 = 0x4000_0000;
const PCD_FC_MASK: u32 = 0x3FFF_FFFF;

const CLX_PRC: u8 = 0x01;
const CLX_PCDT: u8 = 0x02;

const FIELD_BEGIN: char = '\u{13}';
const FIELD_SEPARATOR: char = '\u{14}';
const FIELD_END: char = '\u{15}';

/// Extract the main document text from a legacy Word binary file.
pub fn extract_doc(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut compound = CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| ExtractError::Doc(format!("not an OLE compound document: {}", e)))?;

    let word_document = read_stream(&mut compound, "/WordDocument")?;
    let fib = Fib::parse(&word_document)?;

    if fib.encrypted {
        return Err(ExtractError::Doc("encrypted documents are not supported".to_string()));
    }

    let table = read_stream(&mut compound, fib.table_stream())?;
    let clx = table
        .get(fib.fc_clx..fib.fc_clx + fib.lcb_clx)
        .ok_or_else(|| ExtractError::Doc("piece table lies outside the table stream".to_string()))?;

    let pieces = parse_clx(clx)?;

    let mut raw = String::new();
    let mut remaining = fib.ccp_text;
    for piece in pieces {
        if remaining == 0 {
            break;
        }
        let chars = piece.char_count().min(remaining);
        raw.push_str(&piece.decode(&word_document, chars)?);
        remaining -= chars;
    }

    Ok(clean_text(&raw))
}

/// The few File Information Block fields needed to find the text.
#[derive(Debug)]
struct Fib {
    encrypted: bool,
    use_1table: bool,
    ccp_text: usize,
    fc_clx: usize,
    lcb_clx: usize,
}

impl Fib {
    fn parse(word_document: &[u8]) -> Result<Self, ExtractError> {
        if word_document.len() < FIB_MIN_LEN {
            return Err(ExtractError::Doc("WordDocument stream is too short".to_string()));
        }
        if read_u16(word_document, 0) != Some(FIB_IDENT) {
            return Err(ExtractError::Doc("WordDocument stream has no Word signature".to_string()));
        }

        let flags = read_u16(word_document, OFFSET_FLAGS).unwrap_or(0);
        let field = |offset| read_u32(word_document, offset).map(|v| v as usize).unwrap_or(0);

        Ok(Self {
            encrypted: flags & FLAG_ENCRYPTED != 0,
            use_1table: flags & FLAG_WHICH_TABLE != 0,
            ccp_text: field(OFFSET_CCP_TEXT),
            fc_clx: field(OFFSET_FC_CLX),
            lcb_clx: field(OFFSET_LCB_CLX),
        })
    }

    fn table_stream(&self) -> &'static str {
        if self.use_1table { "/1Table" } else { "/0Table" }
    }
}

#[derive(Debug, PartialEq)]
struct Piece {
    cp_start: usize,
    cp_end: usize,
    offset: usize,
    compressed: bool,
}

impl Piece {
    fn char_count(&self) -> usize {
        self.cp_end.saturating_sub(self.cp_start)
    }

    fn decode(&self, word_document: &[u8], chars: usize) -> Result<String, ExtractError> {
        let width = if self.compressed { 1 } else { 2 };
        let bytes = word_document
            .get(self.offset..self.offset + chars * width)
            .ok_or_else(|| ExtractError::Doc(format!("text piece at offset {} is truncated", self.offset)))?;

        if self.compressed {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(text.into_owned())
        } else {
            let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
            Ok(String::from_utf16_lossy(&units))
        }
    }
}

/// Walk the Clx: skip any Prc (property modifier) entries, then parse the Pcdt's PlcPcd.
fn parse_clx(clx: &[u8]) -> Result<Vec<Piece>, ExtractError> {
    let mut pos = 0;
    while pos < clx.len() {
        match clx[pos] {
            CLX_PRC => {
                let cb = read_u16(clx, pos + 1).ok_or_else(|| truncated("Prc"))? as usize;
                pos += 3 + cb;
            }
            CLX_PCDT => {
                let lcb = read_u32(clx, pos + 1).ok_or_else(|| truncated("Pcdt"))? as usize;
                let plc = clx.get(pos + 5..pos + 5 + lcb).ok_or_else(|| truncated("PlcPcd"))?;
                return parse_plc_pcd(plc);
            }
            other => {
                return Err(ExtractError::Doc(format!("unexpected Clx entry type {:#04x}", other)));
            }
        }
    }
    Err(ExtractError::Doc("document has no piece table".to_string()))
}

/// PlcPcd: `n + 1` character positions followed by `n` 8-byte piece descriptors.
fn parse_plc_pcd(plc: &[u8]) -> Result<Vec<Piece>, ExtractError> {
    if plc.len() < 4 || (plc.len() - 4) % 12 != 0 {
        return Err(ExtractError::Doc(format!("piece table has invalid length {}", plc.len())));
    }
    let n = (plc.len() - 4) / 12;
    let descriptors = 4 * (n + 1);

    (0..n)
        .map(|i| {
            let cp_start = read_u32(plc, 4 * i).ok_or_else(|| truncated("PlcPcd"))? as usize;
            let cp_end = read_u32(plc, 4 * (i + 1)).ok_or_else(|| truncated("PlcPcd"))? as usize;
            // Pcd: 2 bytes of flags, then the 4-byte FcCompressed
            let fc = read_u32(plc, descriptors + 8 * i + 2).ok_or_else(|| truncated("Pcd"))?;
            let compressed = fc & PCD_COMPRESSED != 0;
            let fc = (fc & PCD_FC_MASK) as usize;

            Ok(Piece {
                cp_start,
                cp_end,
                offset: if compressed { fc / 2 } else { fc },
                compressed,
            })
        })
        .collect()
}

/// Turn Word's control characters into plain-text whitespace and drop field instructions.
///
/// Fields look like `0x13 instructions 0x14 result 0x15` and may nest; only results are kept.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // One entry per open field: true while still inside its instructions
    let mut fields: Vec<bool> = Vec::new();
    // Number of `true` entries in `fields`
    let mut instruction_depth = 0usize;

    for c in raw.chars() {
        match c {
            FIELD_BEGIN => {
                fields.push(true);
                instruction_depth += 1;
            }
            FIELD_SEPARATOR => {
                if let Some(in_instructions) = fields.last_mut()
                    && *in_instructions
                {
                    *in_instructions = false;
                    instruction_depth -= 1;
                }
            }
            FIELD_END => {
                if fields.pop() == Some(true) {
                    instruction_depth -= 1;
                }
            }
            _ if instruction_depth > 0 => {}
            '\r' | '\u{0B}' | '\u{0C}' => out.push('\n'),
            // Cell and row end marks
            '\u{07}' => out.push('\t'),
            // Non-breaking hyphen
            '\u{1E}' => out.push('-'),
            '\t' | '\n' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out.trim().to_string()
}

fn read_stream<F: Read + Seek>(compound: &mut CompoundFile<F>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut stream = compound
        .open_stream(name)
        .map_err(|e| ExtractError::Doc(format!("missing {} stream: {}", name.trim_start_matches('/'), e)))?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|e| ExtractError::Doc(format!("failed to read {} stream: {}", name.trim_start_matches('/'), e)))?;
    Ok(data)
}

fn truncated(structure: &str) -> ExtractError {
    ExtractError::Doc(format!("{} structure is truncated", structure))
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
