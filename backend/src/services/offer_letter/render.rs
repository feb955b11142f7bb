//! Fills `{{ key }}` placeholders in a DOCX template.
//!
//! A DOCX file is a ZIP archive of XML parts. The body, headers and footers
//! are scanned for placeholders; every other part is copied unchanged.
//!
//! Word frequently splits what the author typed as one placeholder over
//! several runs (`{{</w:t></w:r><w:r><w:t>full_name }}`), so the pattern
//! tolerates markup between and inside the braces. The markup inside a
//! matched placeholder is dropped, which merges the runs it spanned.
//!
//! Keys missing from the context render as an empty string and are logged
//! once per render. This matches how the context is built: every known key
//! is always present, so a missing one means the template uses a name the
//! portal does not provide.

use common::model::render_context::RenderContext;
use log::warn;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::sync::OnceLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, thiserror::Error)]
pub enum TemplateRenderError {
    #[error("template is not a readable DOCX archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),
    #[error("template has no word/document.xml part")]
    MissingDocumentPart,
    #[error("template part {part} is not valid UTF-8")]
    InvalidEncoding { part: String },
    #[error("unsupported placeholder '{expression}' in {part}")]
    InvalidPlaceholder { part: String, expression: String },
    #[error("failed to assemble rendered document: {0}")]
    Io(#[from] std::io::Error),
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(?:<[^>]*>)*\{((?:<[^>]*>|[^{}<])*?)\}(?:<[^>]*>)*\}")
            .expect("placeholder pattern is valid")
    })
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

/// Parts of the archive that may contain placeholders.
fn is_template_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// Extracts the key from the captured inside of a placeholder.
fn placeholder_key(part: &str, inner: &str) -> Result<String, TemplateRenderError> {
    let key = markup_re().replace_all(inner, "");
    let key = key.trim();
    if identifier_re().is_match(key) {
        Ok(key.to_string())
    } else {
        Err(TemplateRenderError::InvalidPlaceholder {
            part: part.to_string(),
            expression: key.to_string(),
        })
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Replaces every placeholder in one XML part. Keys with no value are
/// collected into `missing`.
fn substitute_part(
    part: &str,
    xml: &str,
    context: &RenderContext,
    missing: &mut BTreeSet<String>,
) -> Result<String, TemplateRenderError> {
    let mut failure = None;
    let rendered = placeholder_re().replace_all(xml, |caps: &Captures| {
        match placeholder_key(part, &caps[1]) {
            Ok(key) => match context.get(&key) {
                Some(value) => escape_xml(value),
                None => {
                    missing.insert(key);
                    String::new()
                }
            },
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(rendered.into_owned()),
    }
}

fn read_part(file: &mut impl Read, part: &str) -> Result<String, TemplateRenderError> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| TemplateRenderError::InvalidEncoding {
        part: part.to_string(),
    })
}

/// Renders `template` (DOCX bytes) with `context`, returning new DOCX bytes.
///
/// Pure: nothing is written outside the returned buffer.
pub fn render(template: &[u8], context: &RenderContext) -> Result<Vec<u8>, TemplateRenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    if archive.index_for_name(DOCUMENT_PART).is_none() {
        return Err(TemplateRenderError::MissingDocumentPart);
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut missing = BTreeSet::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let name = file.name().to_string();

        if file.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        if is_template_part(&name) {
            let xml = read_part(&mut file, &name)?;
            let rendered = substitute_part(&name, &xml, context, &mut missing)?;
            writer.start_file(name, options)?;
            writer.write_all(rendered.as_bytes())?;
        } else {
            writer.start_file(name, options)?;
            std::io::copy(&mut file, &mut writer)?;
        }
    }

    for key in &missing {
        warn!("offer letter template uses '{{{{ {key} }}}}' which has no value; rendered empty");
    }

    Ok(writer.finish()?.into_inner())
}

/// Lists the distinct placeholder keys a template declares, sorted.
pub fn placeholders(template: &[u8]) -> Result<Vec<String>, TemplateRenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    if archive.index_for_name(DOCUMENT_PART).is_none() {
        return Err(TemplateRenderError::MissingDocumentPart);
    }

    let mut keys = BTreeSet::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let name = file.name().to_string();
        if file.is_dir() || !is_template_part(&name) {
            continue;
        }
        let xml = read_part(&mut file, &name)?;
        for caps in placeholder_re().captures_iter(&xml) {
            keys.insert(placeholder_key(&name, &caps[1])?);
        }
    }
    Ok(keys.into_iter().collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal DOCX with the given body XML and optional header part.
    pub(crate) fn docx(body: &str, header: Option<&str>) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer
            .start_file("[Content_Types].xml", options)
            .expect("start content types");
        writer
            .write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .expect("write content types");
        writer
            .start_file(DOCUMENT_PART, options)
            .expect("start document");
        let document = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        writer.write_all(document.as_bytes()).expect("write document");
        if let Some(header) = header {
            writer
                .start_file("word/header1.xml", options)
                .expect("start header");
            writer.write_all(header.as_bytes()).expect("write header");
        }
        writer
            .finish()
            .expect("finish archive")
            .into_inner()
    }

    fn part(docx: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(docx)).expect("archive");
        let mut file = archive.by_name(name).expect("part present");
        let mut xml = String::new();
        file.read_to_string(&mut xml).expect("utf8 part");
        xml
    }

    fn context() -> RenderContext {
        RenderContext::new()
            .with("full_name", "Amina Nakato")
            .with("program_name", "Computer Science & Engineering")
            .with("reg_no", "24/U/0042")
    }

    #[test]
    fn fills_simple_placeholders_and_escapes_values() {
        let template = docx(
            "<w:p><w:r><w:t>Dear {{ full_name }}, welcome to {{program_name}}.</w:t></w:r></w:p>",
            None,
        );

        let rendered = render(&template, &context()).expect("renders");
        let body = part(&rendered, DOCUMENT_PART);

        assert!(body.contains("Dear Amina Nakato, welcome to Computer Science &amp; Engineering."));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn merges_placeholders_split_across_runs() {
        let template = docx(
            "<w:p><w:r><w:t>Reg: {</w:t></w:r><w:r><w:t>{ reg_</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>no }}</w:t></w:r></w:p>",
            None,
        );

        let rendered = render(&template, &context()).expect("renders");
        let body = part(&rendered, DOCUMENT_PART);

        assert!(body.contains("Reg: 24/U/0042"), "{body}");
        assert_eq!(body.matches("<w:r>").count(), body.matches("</w:r>").count());
    }

    #[test]
    fn missing_keys_render_empty() {
        let template = docx("<w:p><w:r><w:t>Fees: [{{ fees }}]</w:t></w:r></w:p>", None);

        let rendered = render(&template, &context()).expect("renders");

        assert!(part(&rendered, DOCUMENT_PART).contains("Fees: []"));
    }

    #[test]
    fn headers_are_rendered_and_other_parts_copied() {
        let template = docx(
            "<w:p/>",
            Some("<w:hdr><w:t>{{ full_name }}</w:t></w:hdr>"),
        );

        let rendered = render(&template, &context()).expect("renders");

        assert_eq!(part(&rendered, "word/header1.xml"), "<w:hdr><w:t>Amina Nakato</w:t></w:hdr>");
        assert_eq!(
            part(&rendered, "[Content_Types].xml"),
            part(&template, "[Content_Types].xml")
        );
    }

    #[test]
    fn expressions_are_rejected() {
        let template = docx("<w:t>{{ fees | currency }}</w:t>", None);

        match render(&template, &context()) {
            Err(TemplateRenderError::InvalidPlaceholder { expression, .. }) => {
                assert_eq!(expression, "fees | currency")
            }
            other => panic!("expected InvalidPlaceholder, got {other:?}"),
        }
    }

    #[test]
    fn non_docx_input_is_rejected() {
        assert!(matches!(
            render(b"plain text, not a zip", &context()),
            Err(TemplateRenderError::InvalidArchive(_))
        ));
    }

    #[test]
    fn lists_declared_placeholders() {
        let template = docx(
            "<w:t>{{ full_name }} {{reg_no}} {{ full_name }}</w:t>",
            Some("<w:t>{{ campus }}</w:t>"),
        );

        assert_eq!(
            placeholders(&template).expect("scans"),
            vec!["campus", "full_name", "reg_no"]
        );
    }
}
