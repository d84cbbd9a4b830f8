use crate::constants::{
    CONTENT_TYPES_NAMESPACE, CONTENT_TYPES_PART, OFFICE_DOCUMENT_REL, XML_DECLARATION,
};
use crate::parse_rels::{parse_rels, rels_path_for, resolve_target, Relationships};
use crate::xml_tree::XmlDocument;
use crate::{Error, Result};
use quick_xml::escape::escape;
use roxmltree::Document;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

/// An OOXML package held fully in memory.
///
/// `Package` keeps every zip entry as raw bytes keyed by its part name (no leading slash)
/// and parses `[Content_Types].xml` into a small table that is regenerated on save.
/// Parts are parsed lazily by the callers that need them, so binary media passes
/// through untouched.
#[derive(Debug, Clone)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
}

#[derive(Debug, Clone, Default)]
struct ContentTypes {
    /// Lower-cased extension to content type.
    defaults: Vec<(String, String)>,
    /// Part name (with leading slash) to content type.
    overrides: Vec<(String, String)>,
}

impl Package {
    /// Opens a PowerPoint pptx file and loads all of its parts.
    ///
    /// # Errors
    ///
    /// Errors are returned on file access problems, failures during the unzipping
    /// process, or an unreadable `[Content_Types].xml`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            parts.insert(name, content);
        }

        let content_types = match parts.remove(CONTENT_TYPES_PART) {
            Some(data) => ContentTypes::parse(&data)?,
            None => {
                return Err(Error::Integrity(format!(
                    "package has no {}",
                    CONTENT_TYPES_PART
                )))
            }
        };

        Ok(Self { parts, content_types })
    }

    /// Creates an empty package. Mostly useful to build fixtures.
    pub fn new() -> Self {
        let mut content_types = ContentTypes::default();
        content_types.set_default("rels", crate::constants::RELS_CONTENT_TYPE);
        content_types.set_default("xml", "application/xml");
        Self { parts: BTreeMap::new(), content_types }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let cursor = self.write_to(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    /// Writes the package as a zip archive, `[Content_Types].xml` first.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(CONTENT_TYPES_PART, options)?;
        zip.write_all(&self.content_types.to_bytes())?;

        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn part(&self, name: &str) -> Result<&[u8]> {
        self.parts
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::MissingPart(name.to_string()))
    }

    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        self.parts.insert(name.to_string(), data);
    }

    /// Removes a part together with its relationship file and content type override.
    pub fn remove_part(&mut self, name: &str) {
        self.parts.remove(name);
        self.parts.remove(&rels_path_for(name));
        self.content_types.remove_override(name);
    }

    pub fn xml_part(&self, name: &str) -> Result<XmlDocument> {
        XmlDocument::parse(self.part(name)?)
    }

    pub fn set_xml_part(&mut self, name: &str, doc: &XmlDocument) {
        self.set_part(name, doc.to_bytes());
    }

    /// Relationships owned by `part`; empty when the part has no `.rels` file.
    pub fn relationships(&self, part: &str) -> Result<Relationships> {
        match self.parts.get(&rels_path_for(part)) {
            Some(data) => parse_rels(data),
            None => Ok(Relationships::default()),
        }
    }

    pub fn set_relationships(&mut self, part: &str, rels: &Relationships) {
        self.set_part(&rels_path_for(part), rels.to_bytes());
    }

    /// Part name of the main presentation, found through the package-level
    /// `officeDocument` relationship.
    pub fn main_document_part(&self) -> Result<String> {
        let rels = self.relationships("")?;
        let target = rels
            .of_type(OFFICE_DOCUMENT_REL)
            .next()
            .map(|rel| resolve_target("", &rel.target));
        target.ok_or_else(|| Error::Integrity("package has no officeDocument relationship".to_string()))
    }

    pub fn content_type(&self, part: &str) -> Option<&str> {
        self.content_types.lookup(part)
    }

    /// Whether `part` has its own `<Override>` entry rather than an extension default.
    pub fn has_override(&self, part: &str) -> bool {
        let key = override_key(part);
        self.content_types
            .overrides
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(&key))
    }

    /// Registers `content_type` for `part`, reusing an extension default when it already matches.
    pub fn set_content_type(&mut self, part: &str, content_type: &str) {
        if self.content_types.default_for(part) == Some(content_type) {
            return;
        }
        self.content_types.set_override(part, content_type);
    }

    /// Adds an extension default unless one is already declared for `extension`.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        if !self.content_types.defaults.iter().any(|(ext, _)| *ext == extension) {
            self.content_types.set_default(&extension, content_type);
        }
    }

    /// First free name shaped like `like` in the same directory: the trailing number of the
    /// file stem is replaced with one past the highest number already used.
    ///
    /// `ppt/slides/slide1.xml` becomes `ppt/slides/slide7.xml` when `slide6.xml` exists.
    pub fn unique_part_name(&self, like: &str) -> String {
        let (dir, file) = like.rsplit_once('/').unwrap_or(("", like));
        let (stem, ext) = match file.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (file, String::new()),
        };
        let base = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        let prefix = if dir.is_empty() { base.to_string() } else { format!("{}/{}", dir, base) };

        let highest = self
            .parts
            .keys()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.strip_suffix(ext.as_str()))
            .filter_map(|digits| digits.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        let mut n = highest + 1;
        loop {
            let candidate = format!("{}{}{}", prefix, n, ext);
            if !self.parts.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(part: &str) -> Option<String> {
    let file = part.rsplit('/').next().unwrap_or(part);
    file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

fn override_key(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

impl ContentTypes {
    fn parse(xml_data: &[u8]) -> Result<Self> {
        let xml_str = std::str::from_utf8(xml_data)?.trim_start_matches('\u{feff}');
        let doc = Document::parse(xml_str)?;
        let mut types = ContentTypes::default();

        for node in doc.root_element().children().filter(|n| n.is_element()) {
            let content_type = match node.attribute("ContentType") {
                Some(ct) => ct.to_string(),
                None => continue,
            };
            match node.tag_name().name() {
                "Default" => {
                    if let Some(ext) = node.attribute("Extension") {
                        types.defaults.push((ext.to_ascii_lowercase(), content_type));
                    }
                }
                "Override" => {
                    if let Some(part) = node.attribute("PartName") {
                        types.overrides.push((override_key(part), content_type));
                    }
                }
                _ => (),
            }
        }

        Ok(types)
    }

    fn default_for(&self, part: &str) -> Option<&str> {
        let ext = extension_of(part)?;
        self.defaults
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, ct)| ct.as_str())
    }

    fn lookup(&self, part: &str) -> Option<&str> {
        let key = override_key(part);
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
            .map(|(_, ct)| ct.as_str())
            .or_else(|| self.default_for(part))
    }

    fn set_default(&mut self, extension: &str, content_type: &str) {
        self.defaults.retain(|(ext, _)| ext != extension);
        self.defaults.push((extension.to_string(), content_type.to_string()));
    }

    fn set_override(&mut self, part: &str, content_type: &str) {
        let key = override_key(part);
        self.overrides.retain(|(name, _)| *name != key);
        self.overrides.push((key, content_type.to_string()));
    }

    fn remove_override(&mut self, part: &str) {
        let key = override_key(part);
        self.overrides.retain(|(name, _)| *name != key);
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(512 + self.overrides.len() * 160);
        out.push_str(XML_DECLARATION);
        out.push_str("\r\n<Types xmlns=\"");
        out.push_str(CONTENT_TYPES_NAMESPACE);
        out.push_str("\">");
        for (ext, ct) in &self.defaults {
            out.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (part, ct) in &self.overrides {
            out.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape(part.as_str()),
                escape(ct.as_str())
            ));
        }
        out.push_str("</Types>");
        out.into_bytes()
    }
}
