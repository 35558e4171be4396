//! Pascal VOC XML export: one annotation file per image.
//!
//! Classic `annotation/folder/filename/size/object/bndbox` layout. Box
//! coordinates stay in absolute pixels and are rounded to 12 decimal digits
//! before formatting, so sub-pixel extents survive the trip through XML.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{EngineError, Result};
use crate::export::round12;
use crate::export::snapshot::{ProjectSnapshot, SnapshotImage};

/// Path of the XML file for one image.
pub(super) fn artifact_path(dir: &Path, image: &SnapshotImage) -> PathBuf {
    dir.join(format!("{}.xml", image.record.stem()))
}

/// Write one image's VOC file. Images without annotations produce a valid
/// document with no `<object>` elements.
pub(super) fn write_image(
    dir: &Path,
    image: &SnapshotImage,
    snapshot: &ProjectSnapshot,
) -> Result<(PathBuf, usize, usize)> {
    let path = artifact_path(dir, image);
    let (xml, written) = build_xml(image, snapshot)?;
    fs::write(&path, xml).map_err(|e| EngineError::export_io(&path, e))?;
    Ok((path, written, 0))
}

fn build_xml(image: &SnapshotImage, snapshot: &ProjectSnapshot) -> Result<(String, usize)> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(|e| EngineError::Xml(e.into()))?;

    writer
        .write_event(Event::Start(BytesStart::new("annotation")))
        .map_err(|e| EngineError::Xml(e.into()))?;

    let folder = image
        .record
        .path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("");
    write_text_element(&mut writer, "folder", folder)?;
    write_text_element(&mut writer, "filename", image.record.filename())?;

    writer
        .write_event(Event::Start(BytesStart::new("size")))
        .map_err(|e| EngineError::Xml(e.into()))?;
    write_text_element(&mut writer, "width", &image.record.width.to_string())?;
    write_text_element(&mut writer, "height", &image.record.height.to_string())?;
    write_text_element(&mut writer, "depth", "3")?;
    writer
        .write_event(Event::End(BytesEnd::new("size")))
        .map_err(|e| EngineError::Xml(e.into()))?;

    write_text_element(&mut writer, "segmented", "0")?;

    let mut written = 0;
    for ann in &image.annotations {
        writer
            .write_event(Event::Start(BytesStart::new("object")))
            .map_err(|e| EngineError::Xml(e.into()))?;

        write_text_element(&mut writer, "name", snapshot.class_name(ann.class_id))?;
        write_text_element(&mut writer, "pose", "Unspecified")?;
        write_text_element(&mut writer, "truncated", "0")?;
        write_text_element(&mut writer, "difficult", "0")?;

        writer
            .write_event(Event::Start(BytesStart::new("bndbox")))
            .map_err(|e| EngineError::Xml(e.into()))?;
        write_text_element(&mut writer, "xmin", &round12(ann.bbox.x_min).to_string())?;
        write_text_element(&mut writer, "ymin", &round12(ann.bbox.y_min).to_string())?;
        write_text_element(&mut writer, "xmax", &round12(ann.bbox.x_max).to_string())?;
        write_text_element(&mut writer, "ymax", &round12(ann.bbox.y_max).to_string())?;
        writer
            .write_event(Event::End(BytesEnd::new("bndbox")))
            .map_err(|e| EngineError::Xml(e.into()))?;

        writer
            .write_event(Event::End(BytesEnd::new("object")))
            .map_err(|e| EngineError::Xml(e.into()))?;
        written += 1;
    }

    writer
        .write_event(Event::End(BytesEnd::new("annotation")))
        .map_err(|e| EngineError::Xml(e.into()))?;

    let bytes = writer.into_inner();
    // The writer only ever received UTF-8 text.
    let xml = String::from_utf8_lossy(&bytes).into_owned();
    Ok((xml, written))
}

/// Write a simple `<name>value</name>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| EngineError::Xml(e.into()))?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| EngineError::Xml(e.into()))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| EngineError::Xml(e.into()))?;
    Ok(())
}
