use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::CatalogError;
use crate::item::FileReference;

/// File extension of a descriptor.
pub const DESCRIPTOR_EXTENSION: &str = "ovf";

/// The parts of an OVF envelope this crate acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// `References/File` entries in document order.
    pub references: Vec<FileReference>,
}

/// Turns descriptor text into an [`Envelope`].
pub trait DescriptorDecoder: Send + Sync {
    fn decode(&self, text: &str) -> Result<Envelope, CatalogError>;
}

/// Decoder for OVF XML, reading only the file reference list.
#[derive(Debug, Default, Clone, Copy)]
pub struct OvfDecoder;

impl DescriptorDecoder for OvfDecoder {
    fn decode(&self, text: &str) -> Result<Envelope, CatalogError> {
        read_envelope(text)
    }
}

/// Parse an OVF document and collect its file references.
pub fn read_envelope(text: &str) -> Result<Envelope, CatalogError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut envelope = Envelope::default();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut in_references = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CatalogError::DescriptorParse(e.to_string()))?;

        match event {
            Event::Start(start) => {
                check_root(&start, depth, &mut saw_root)?;
                depth += 1;
                match local_name(&start).as_str() {
                    "References" if depth == 2 => in_references = true,
                    "File" if in_references => envelope.references.push(file_reference(&start)?),
                    _ => {}
                }
            }
            Event::Empty(start) => {
                check_root(&start, depth, &mut saw_root)?;
                if in_references && local_name(&start) == "File" {
                    envelope.references.push(file_reference(&start)?);
                }
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if end.local_name().as_ref() == b"References" {
                    in_references = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(CatalogError::DescriptorParse(
            "document has no Envelope element".into(),
        ));
    }
    if depth != 0 {
        return Err(CatalogError::DescriptorParse(
            "document ended inside an open element".into(),
        ));
    }

    Ok(envelope)
}

fn check_root(
    start: &BytesStart<'_>,
    depth: usize,
    saw_root: &mut bool,
) -> Result<(), CatalogError> {
    if depth > 0 {
        return Ok(());
    }
    let name = local_name(start);
    if name != "Envelope" || *saw_root {
        return Err(CatalogError::DescriptorParse(format!(
            "unexpected root element {name}"
        )));
    }
    *saw_root = true;
    Ok(())
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn file_reference(start: &BytesStart<'_>) -> Result<FileReference, CatalogError> {
    let mut href = None;
    let mut size = None;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| CatalogError::DescriptorParse(format!("bad attribute: {e}")))?;
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|e| CatalogError::DescriptorParse(format!("invalid UTF-8: {e}")))?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|e| CatalogError::DescriptorParse(format!("bad attribute value: {e}")))?;

        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value.into_owned()),
            b"size" => {
                let parsed = value.trim().parse::<u64>().map_err(|e| {
                    CatalogError::DescriptorParse(format!("invalid file size {value:?}: {e}"))
                })?;
                size = Some(parsed);
            }
            _ => {}
        }
    }

    let name = href.filter(|h| !h.is_empty()).ok_or_else(|| {
        CatalogError::DescriptorParse("File reference without href".into())
    })?;

    Ok(FileReference { name, size })
}
