use crate::error::{GeoMcfError, Result};
use quick_xml::events::{BytesDecl, Event};
use quick_xml::{Reader, Writer};

/// Re-indent an XML document with two spaces and drop whitespace-only lines.
/// Text with content is kept as written. Fails when the document is not well
/// formed. A declaration is added when the input has none.
pub fn pretty_print(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut open: Vec<String> = Vec::new();
    let mut has_root = false;
    let mut has_decl = false;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => continue,
            Event::Decl(_) => {
                if has_decl || has_root {
                    return Err(malformed("misplaced XML declaration"));
                }
                has_decl = true;
            }
            Event::Start(start) => {
                if open.is_empty() && has_root {
                    return Err(malformed("more than one root element"));
                }
                open.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                has_root = true;
            }
            Event::Empty(_) => {
                if open.is_empty() && has_root {
                    return Err(malformed("more than one root element"));
                }
                has_root = true;
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(_) | Event::CData(_) if open.is_empty() => {
                return Err(malformed("text outside the root element"));
            }
            _ => {}
        }

        if !has_decl && !matches!(event, Event::Decl(_)) {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            has_decl = true;
        }
        writer.write_event(event)?;
    }

    if let Some(name) = open.last() {
        return Err(quick_xml::Error::UnexpectedEof(format!("unclosed element <{name}>")).into());
    }
    if !has_root {
        return Err(malformed("document has no root element"));
    }

    let pretty = String::from_utf8(writer.into_inner())
        .map_err(|e| GeoMcfError::Other(format!("rendered XML is not UTF-8: {e}")))?;

    Ok(pretty
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn malformed(message: &str) -> GeoMcfError {
    GeoMcfError::MalformedXml(message.to_string())
}
