use std::fs::File;
use std::io::Read;
use std::path::Path;

use docqa_core::traits::DocumentReader;
use docqa_core::Result;

/// Plain text: UTF-8 first, Latin-1 when the bytes are not valid UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReader;

impl DocumentReader for TextReader {
    fn read(&self, path: &Path) -> Result<String> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Ok(decode(bytes).trim().to_string())
    }
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        // every byte is a valid Latin-1 code point
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}
