use crate::constants::{PACKAGE_RELS_NAMESPACE, XML_DECLARATION};
use crate::Result;
use quick_xml::escape::escape;
use roxmltree::Document;

/// One entry of a part's relationship list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// The relationship list of a single part, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub items: Vec<Relationship>,
}

/// Parses relationship (`.rels`) XML data.
///
/// Relationship files map the IDs a part uses internally (`r:id`, `r:embed`, ...) to
/// the parts or external targets they point at.
///
/// # Errors
///
/// An error is returned if:
/// - The XML data is not valid UTF-8.
/// - Malformed or invalid XML structure is detected.
pub fn parse_rels(xml_data: &[u8]) -> Result<Relationships> {
    let xml_str = std::str::from_utf8(xml_data)?.trim_start_matches('\u{feff}');
    let doc = Document::parse(xml_str)?;
    let root = doc.root_element();

    let mut items = Vec::new();
    for rel in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
    {
        if let (Some(id), Some(rel_type), Some(target)) =
            (rel.attribute("Id"), rel.attribute("Type"), rel.attribute("Target"))
        {
            items.push(Relationship {
                id: id.to_string(),
                rel_type: rel_type.to_string(),
                target: target.to_string(),
                external: rel.attribute("TargetMode") == Some("External"),
            });
        }
    }

    Ok(Relationships { items })
}

impl Relationships {
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.id == id)
    }

    pub fn of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.items.iter().filter(move |rel| rel.rel_type == rel_type)
    }

    /// Next `rIdN` not used by this list, `N` being one past the highest numeric suffix.
    pub fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        let mut n = max + 1;
        loop {
            let candidate = format!("rId{}", n);
            if self.get(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Appends an internal relationship under a fresh ID and returns that ID.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.items.iter().position(|rel| rel.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(256 + self.items.len() * 160);
        out.push_str(XML_DECLARATION);
        out.push_str("\r\n<Relationships xmlns=\"");
        out.push_str(PACKAGE_RELS_NAMESPACE);
        out.push_str("\">");
        for rel in &self.items {
            out.push_str("<Relationship Id=\"");
            out.push_str(&escape(rel.id.as_str()));
            out.push_str("\" Type=\"");
            out.push_str(&escape(rel.rel_type.as_str()));
            out.push_str("\" Target=\"");
            out.push_str(&escape(rel.target.as_str()));
            out.push('"');
            if rel.external {
                out.push_str(" TargetMode=\"External\"");
            }
            out.push_str("/>");
        }
        out.push_str("</Relationships>");
        out.into_bytes()
    }
}

/// Path of the `.rels` file that belongs to `part`.
///
/// `ppt/slides/slide1.xml` becomes `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the part that owns the relationship,
/// returning a package path without leading slash.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if dir.is_empty() {
        normalize_path(target)
    } else {
        normalize_path(&format!("{}/{}", dir, target))
    }
}

/// Builds the target string a relationship owned by `from_part` needs to reach `to_part`.
pub fn relative_target(from_part: &str, to_part: &str) -> String {
    let from_dir: Vec<&str> = from_part
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let to: Vec<&str> = to_part.split('/').collect();

    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = std::iter::repeat("..").take(from_dir.len() - common).collect();
    segments.extend(&to[common..]);
    segments.join("/")
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
