//! XML helpers for asserting on rendered layer definitions.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Panic with the offending document unless `xml` is well-formed
pub fn assert_well_formed(xml: &str) {
    if let Err(reason) = check_well_formed(xml) {
        panic!("document is not well-formed XML: {}\n{}", reason, xml);
    }
}

/// Parse the whole document: balanced tags, valid entities, one root element
pub fn check_well_formed(xml: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
                check_attributes(&e)?;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    roots += 1;
                }
                check_attributes(&e)?;
            }
            Ok(Event::End(_)) => {
                depth = depth.checked_sub(1).ok_or("end tag without start tag")?;
            }
            Ok(Event::Text(text)) => {
                text.unescape().map_err(|e| format!("bad text content: {}", e))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("at byte {}: {}", reader.buffer_position(), e)),
        }
    }

    if depth != 0 {
        return Err(format!("{} element(s) left open", depth));
    }
    if roots != 1 {
        return Err(format!("expected one root element, found {}", roots));
    }
    Ok(())
}

fn check_attributes(start: &BytesStart<'_>) -> Result<(), String> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
        if attr.value.contains(&b'<') {
            return Err(format!(
                "raw '<' in attribute {}",
                String::from_utf8_lossy(attr.key.as_ref())
            ));
        }
        attr.unescape_value().map_err(|e| format!("bad attribute value: {}", e))?;
    }
    Ok(())
}

/// Unescaped text of every element named `name`, in document order
pub fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut capture: Option<(usize, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if capture.is_none() && e.name().as_ref() == name.as_bytes() {
                    capture = Some((depth, String::new()));
                }
            }
            Ok(Event::Empty(e)) => {
                if capture.is_none() && e.name().as_ref() == name.as_bytes() {
                    found.push(String::new());
                }
            }
            Ok(Event::Text(text)) => {
                if let Some((_, buffer)) = capture.as_mut() {
                    if let Ok(value) = text.unescape() {
                        buffer.push_str(&value);
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some((_, buffer)) = capture.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Ok(Event::End(_)) => {
                if matches!(capture, Some((level, _)) if level == depth) {
                    if let Some((_, buffer)) = capture.take() {
                        found.push(buffer);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }

    found
}

/// Parse every element named `name` as a float
pub fn element_floats(xml: &str, name: &str) -> Vec<f64> {
    element_texts(xml, name).iter().filter_map(|text| text.trim().parse().ok()).collect()
}
