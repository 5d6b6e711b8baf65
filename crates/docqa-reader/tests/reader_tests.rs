use std::io::Write;
use std::path::Path;

use docqa_core::types::DocumentFormat;
use docqa_core::Error;
use docqa_reader::{collect_files, content_hash, ReaderRegistry};

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn loads_text_document_with_content_id() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("brazil.txt");
    std::fs::write(&p, "The capital of Brazil is Brasília.").unwrap();

    let doc = ReaderRegistry::default().load(&p).unwrap();
    assert_eq!(doc.format, DocumentFormat::Text);
    assert_eq!(doc.text, "The capital of Brazil is Brasília.");
    assert_eq!(doc.source_name(), "brazil.txt");
    assert_eq!(doc.id.len(), 64);
}

#[test]
fn identical_bytes_share_an_id_across_names() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    let c = dir.path().join("c.txt");
    std::fs::write(&a, "same content").unwrap();
    std::fs::write(&b, "same content").unwrap();
    std::fs::write(&c, "other content").unwrap();
    assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    assert_ne!(content_hash(&a).unwrap(), content_hash(&c).unwrap());
}

#[test]
fn reads_generated_docx() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("report.docx");
    write_docx(&p, &["Quarterly report", "Revenue grew by 12%."]);

    let doc = ReaderRegistry::default().load(&p).unwrap();
    assert_eq!(doc.format, DocumentFormat::Docx);
    assert_eq!(doc.text, "Quarterly report\nRevenue grew by 12%.");
}

#[test]
fn docx_without_body_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("empty.docx");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&p).unwrap());
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("docProps/app.xml", options).unwrap();
    zip.write_all(b"<Properties/>").unwrap();
    zip.finish().unwrap();

    let err = ReaderRegistry::default().load(&p).unwrap_err();
    assert!(matches!(err, Error::CorruptFile { .. }), "got {err:?}");
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("photo.png");
    std::fs::write(&p, [0x89, 0x50, 0x4e, 0x47]).unwrap();
    let registry = ReaderRegistry::default();
    assert!(!registry.supports(&p));
    assert!(matches!(registry.load(&p), Err(Error::UnsupportedFormat(_))));

    let no_ext = dir.path().join("Makefile");
    std::fs::write(&no_ext, "all:").unwrap();
    assert!(matches!(registry.load(&no_ext), Err(Error::UnsupportedFormat(_))));
}

#[test]
fn empty_registry_supports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("a.txt");
    std::fs::write(&p, "x").unwrap();
    assert!(matches!(ReaderRegistry::empty().load(&p), Err(Error::UnsupportedFormat(_))));
}

#[test]
fn collect_walks_directories_and_keeps_explicit_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("docs/nested");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.path().join("docs/b.txt"), "b").unwrap();
    std::fs::write(nested.join("a.pdf"), "a").unwrap();
    std::fs::write(nested.join("skip.png"), "png").unwrap();
    let explicit = dir.path().join("notes.md");
    std::fs::write(&explicit, "md").unwrap();

    let files = collect_files(&[dir.path().join("docs"), explicit.clone()]);
    assert_eq!(files, vec![dir.path().join("docs/b.txt"), nested.join("a.pdf"), explicit]);
}
