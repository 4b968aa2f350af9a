//! Test utilities: in-memory document fixtures and a test server over temporary storage.

use std::io::{Cursor, Write};
use std::path::Path;

use axum_test::TestServer;

use crate::config::{Config, StorageConfig};

/// Config pointing both scratch directories inside `root`.
pub fn create_test_config(root: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage: StorageConfig {
            uploads_dir: root.join("uploads"),
            output_dir: root.join("temp"),
        },
        ..Default::default()
    }
}

pub async fn create_test_app(config: Config) -> TestServer {
    let app = crate::Application::new(config).await.expect("Failed to create application");
    app.into_test_server()
}

/// Names of the files currently in `dir`
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A single-page PDF showing `text` in Helvetica, with a correct xref table.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

/// A DOCX archive with one paragraph per entry.
pub fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", xml_escape(p)))
        .collect();
    docx_from_body(&body)
}

/// A DOCX archive whose `<w:body>` is `body` verbatim.
pub fn docx_from_body(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let content_types = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).expect("zip entry");
    zip.write_all(content_types.as_bytes()).expect("zip write");
    zip.start_file("word/document.xml", options).expect("zip entry");
    zip.write_all(document.as_bytes()).expect("zip write");
    zip.finish().expect("zip finish").into_inner()
}

/// A Word 97 binary document holding `text` as a single compressed (8-bit) piece.
///
/// Use `\r` as the paragraph mark, as Word does.
pub fn minimal_doc(text: &str) -> Vec<u8> {
    const TEXT_OFFSET: usize = 0x400;

    let mut word_document = vec![0u8; TEXT_OFFSET];
    word_document[0..2].copy_from_slice(&0xA5ECu16.to_le_bytes());
    word_document[0x4C..0x50].copy_from_slice(&(text.len() as u32).to_le_bytes());
    word_document.extend_from_slice(text.as_bytes());

    // PlcPcd with a single piece covering the whole text
    let mut plc = Vec::new();
    plc.extend_from_slice(&0u32.to_le_bytes());
    plc.extend_from_slice(&(text.len() as u32).to_le_bytes());
    plc.extend_from_slice(&[0, 0]);
    plc.extend_from_slice(&(((TEXT_OFFSET * 2) as u32) | 0x4000_0000).to_le_bytes());
    plc.extend_from_slice(&[0, 0]);

    let mut clx = vec![0x02];
    clx.extend_from_slice(&(plc.len() as u32).to_le_bytes());
    clx.extend_from_slice(&plc);

    // fcClx = 0 (start of the table stream), lcbClx = clx length
    word_document[0x1A2..0x1A6].copy_from_slice(&0u32.to_le_bytes());
    word_document[0x1A6..0x1AA].copy_from_slice(&(clx.len() as u32).to_le_bytes());

    let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new())).expect("cfb create");
    {
        let mut stream = compound.create_stream("/WordDocument").expect("cfb stream");
        stream.write_all(&word_document).expect("cfb write");
        stream.flush().expect("cfb flush");
    }
    {
        let mut stream = compound.create_stream("/0Table").expect("cfb stream");
        stream.write_all(&clx).expect("cfb write");
        stream.flush().expect("cfb flush");
    }
    compound.flush().expect("cfb flush");
    compound.into_inner().into_inner()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
