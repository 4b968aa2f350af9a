use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use zip::ZipArchive;

use super::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Ceiling on the decompressed size of `word/document.xml`
const MAX_DOCUMENT_XML_SIZE: u64 = 128 * 1024 * 1024;

/// Extract plain text from an Office Open XML (.docx) document.
///
/// DOCX files are ZIP archives; the body lives in `word/document.xml`. Text runs are concatenated,
/// tabs and line breaks inside runs are kept, and paragraphs are separated by a blank line.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    extract_docx_with_limit(bytes, MAX_DOCUMENT_XML_SIZE)
}

fn extract_docx_with_limit(bytes: &[u8], max_xml_size: u64) -> Result<String, ExtractError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(format!("not a valid DOCX archive: {}", e)))?;

    let document = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| ExtractError::Docx(format!("archive has no {}", DOCUMENT_PART)))?;

    // The declared size can lie, so the read itself is capped as well
    if document.size() > max_xml_size {
        return Err(xml_too_large(max_xml_size));
    }
    let mut xml = Vec::new();
    document
        .take(max_xml_size + 1)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(format!("failed to decompress {}: {}", DOCUMENT_PART, e)))?;
    if xml.len() as u64 > max_xml_size {
        return Err(xml_too_large(max_xml_size));
    }

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::with_capacity(1024);
    let mut content = String::with_capacity(8192);

    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" if in_run => in_text = true,
                _ => {}
            },
            // <w:tab/> also appears in paragraph tab-stop definitions, so only count it inside a run
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if in_run => content.push('\t'),
                b"br" | b"cr" if in_run => content.push('\n'),
                b"p" => content.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractError::Docx(format!("invalid text in {}: {}", DOCUMENT_PART, err)))?;
                content.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => content.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Docx(format!(
                    "malformed {} at byte {}: {}",
                    DOCUMENT_PART,
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(content.trim().to_string())
}

fn xml_too_large(max_xml_size: u64) -> ExtractError {
    ExtractError::Docx(format!("{} expands beyond {} bytes", DOCUMENT_PART, max_xml_size))
}
