use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use docqa_core::traits::DocumentReader;
use docqa_core::{Error, Result};

const BODY_PART: &str = "word/document.xml";

/// Reads paragraph text from the main part of a Word (OOXML) package.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxReader;

impl DocumentReader for DocxReader {
    fn read(&self, path: &Path) -> Result<String> {
        let corrupt = |reason: String| Error::CorruptFile { path: path.to_path_buf(), reason };
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;
        let mut xml = String::new();
        archive
            .by_name(BODY_PART)
            .map_err(|e| corrupt(format!("{BODY_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| corrupt(format!("{BODY_PART}: {e}")))?;
        paragraphs_text(&xml).map_err(corrupt)
    }
}

/// Concatenates `w:t` runs, one line per `w:p` paragraph.
fn paragraphs_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed XML at byte {}: {e}", reader.buffer_position())),
            _ => {}
        }
    }
    Ok(out.trim().to_string())
}
