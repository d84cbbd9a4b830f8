use crate::constants::{COMMENTS_REL, NOTES_SLIDE_REL, RELS_NAMESPACE};
use crate::package::Package;
use crate::parse_rels::{relative_target, resolve_target, Relationship, Relationships};
use crate::xml_tree::{XmlDocument, XmlElement};
use crate::Result;
use std::collections::HashMap;

/// Old-to-new relationship IDs for one copied part.
///
/// The map is applied in a single pass, so a chain such as `rId1 -> rId2, rId2 -> rId3`
/// never rewrites an attribute twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelIdMap {
    ids: HashMap<String, String>,
}

impl RelIdMap {
    pub fn insert(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.ids.insert(old_id.into(), new_id.into());
    }

    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.ids.get(old_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rewrites every attribute bound to the relationships namespace (`r:embed`, `r:link`,
    /// `r:id`, ...) below `root` whose value has a mapping.
    ///
    /// # Returns
    ///
    /// The number of attributes rewritten.
    pub fn apply(&self, root: &mut XmlElement, rel_prefix: &str) -> usize {
        if self.ids.is_empty() {
            return 0;
        }
        let qualifier = format!("{}:", rel_prefix);
        let mut rewritten = 0;
        root.visit_mut(&mut |el| {
            for (key, value) in el.attributes.iter_mut() {
                if !key.starts_with(&qualifier) {
                    continue;
                }
                if let Some(new_id) = self.ids.get(value.as_str()) {
                    *value = new_id.clone();
                    rewritten += 1;
                }
            }
        });
        rewritten
    }
}

/// Prefix bound to the relationships namespace on a part's root element.
pub fn rel_prefix_of(root: &XmlElement) -> String {
    root.prefix_for(RELS_NAMESPACE).unwrap_or("r").to_string()
}

/// Copies parts from a read-only source package into a destination package.
///
/// Every copied part gets a fresh name in the destination, its content type is carried
/// over, and each internal relationship target is copied as well (recursively). The
/// copier remembers what it copied, so a master reached from several slides, or the
/// master/layout cycle, is copied exactly once per copier.
///
/// Relationship IDs of a copied part are regenerated and the part's XML is rewritten
/// through a [`RelIdMap`].
pub struct PartCopier<'a> {
    source: &'a Package,
    copied: HashMap<String, String>,
    skipped_rel_types: Vec<String>,
}

impl<'a> PartCopier<'a> {
    /// Creates a copier that drops notes and comments relationships, both of which point
    /// back into the source presentation.
    pub fn new(source: &'a Package) -> Self {
        Self {
            source,
            copied: HashMap::new(),
            skipped_rel_types: vec![NOTES_SLIDE_REL.to_string(), COMMENTS_REL.to_string()],
        }
    }

    pub fn source(&self) -> &'a Package {
        self.source
    }

    /// Destination name of a source part that was already copied.
    pub fn destination_of(&self, source_part: &str) -> Option<&str> {
        self.copied.get(source_part).map(String::as_str)
    }

    /// Records that `source_part` already has a counterpart in the destination, so
    /// references to it resolve to `dest_part` instead of a fresh copy.
    pub fn seed(&mut self, source_part: &str, dest_part: &str) {
        self.copied
            .entry(source_part.to_string())
            .or_insert_with(|| dest_part.to_string());
    }

    /// Source/destination pairs of every part copied so far.
    pub fn copied_parts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.copied.iter().map(|(src, dst)| (src.as_str(), dst.as_str()))
    }

    /// Copies `source_part` and everything it references into `dest`.
    ///
    /// # Returns
    ///
    /// The destination part name.
    pub fn copy_part(&mut self, source_part: &str, dest: &mut Package) -> Result<String> {
        if let Some(existing) = self.copied.get(source_part) {
            return Ok(existing.clone());
        }

        let data = self.source.part(source_part)?.to_vec();
        let dest_part = dest.unique_part_name(source_part);
        self.copied.insert(source_part.to_string(), dest_part.clone());
        // reserve the name while the referenced parts are copied
        dest.set_part(&dest_part, Vec::new());
        self.copy_content_type(source_part, &dest_part, dest);

        let source_rels = self.source.relationships(source_part)?;
        let mut dest_rels = Relationships::default();
        let mut id_map = RelIdMap::default();

        for rel in &source_rels.items {
            if self.skipped_rel_types.iter().any(|t| *t == rel.rel_type) {
                continue;
            }
            if let Some(new_id) = self.copy_relationship(source_part, rel, dest, &dest_part, &mut dest_rels)? {
                id_map.insert(rel.id.clone(), new_id);
            }
        }

        let data = if !id_map.is_empty() && is_xml_part(source_part) {
            let mut doc = XmlDocument::parse(&data)?;
            let prefix = rel_prefix_of(&doc.root);
            id_map.apply(&mut doc.root, &prefix);
            doc.to_bytes()
        } else {
            data
        };

        dest.set_part(&dest_part, data);
        if !dest_rels.items.is_empty() {
            dest.set_relationships(&dest_part, &dest_rels);
        }

        tracing::debug!(source = source_part, destination = %dest_part, rels = dest_rels.items.len(), "copied part");
        Ok(dest_part)
    }

    /// Copies the target of relationship `rel_id` owned by `source_owner`, and records a
    /// relationship to the copy in `dest_rels`, which belongs to `dest_owner`.
    ///
    /// # Returns
    ///
    /// The new relationship ID, or `None` when the source relationship does not exist or
    /// its target is missing from the source package.
    pub fn copy_reference(
        &mut self,
        source_owner: &str,
        rel_id: &str,
        dest: &mut Package,
        dest_owner: &str,
        dest_rels: &mut Relationships,
    ) -> Result<Option<String>> {
        let source_rels = self.source.relationships(source_owner)?;
        match source_rels.get(rel_id) {
            Some(rel) => self.copy_relationship(source_owner, rel, dest, dest_owner, dest_rels),
            None => {
                tracing::warn!(owner = source_owner, rel_id, "relationship not found in source part");
                Ok(None)
            }
        }
    }

    fn copy_relationship(
        &mut self,
        source_owner: &str,
        rel: &Relationship,
        dest: &mut Package,
        dest_owner: &str,
        dest_rels: &mut Relationships,
    ) -> Result<Option<String>> {
        if rel.external {
            let id = dest_rels.next_id();
            dest_rels.items.push(Relationship { id: id.clone(), ..rel.clone() });
            return Ok(Some(id));
        }

        let target = resolve_target(source_owner, &rel.target);
        if !self.source.contains(&target) {
            tracing::warn!(owner = source_owner, target = %target, "dangling relationship left out of copy");
            return Ok(None);
        }

        let copied = self.copy_part(&target, dest)?;
        Ok(Some(dest_rels.add(&rel.rel_type, &relative_target(dest_owner, &copied))))
    }

    fn copy_content_type(&self, source_part: &str, dest_part: &str, dest: &mut Package) {
        let content_type = match self.source.content_type(source_part) {
            Some(ct) => ct.to_string(),
            None => return,
        };
        if !self.source.has_override(source_part) {
            if let Some(ext) = dest_part.rsplit_once('.').map(|(_, ext)| ext) {
                dest.ensure_default(ext, &content_type);
            }
        }
        dest.set_content_type(dest_part, &content_type);
    }
}

fn is_xml_part(part: &str) -> bool {
    let lower = part.to_ascii_lowercase();
    lower.ends_with(".xml") || lower.ends_with(".vml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{IMAGE_REL, SLIDE_LAYOUT_REL};

    const SLIDE_CT: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
    const LAYOUT_CT: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";

    const SLIDE: &str = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:pic><a:blip r:embed="rId3"/></p:pic><p:pic><a:blip r:embed="rId2"/></p:pic><a:hlinkClick r:id="rId4"/></p:spTree></p:cSld></p:sld>"#;

    fn source() -> Package {
        let mut package = Package::new();
        package.ensure_default("png", "image/png");
        package.set_part("ppt/slides/slide1.xml", SLIDE.as_bytes().to_vec());
        package.set_content_type("ppt/slides/slide1.xml", SLIDE_CT);
        package.set_part("ppt/slideLayouts/slideLayout1.xml", b"<p:sldLayout/>".to_vec());
        package.set_content_type("ppt/slideLayouts/slideLayout1.xml", LAYOUT_CT);
        package.set_part("ppt/media/image1.png", vec![1, 1, 1]);
        package.set_part("ppt/media/image2.png", vec![2, 2, 2]);

        let mut rels = Relationships::default();
        rels.add(SLIDE_LAYOUT_REL, "../slideLayouts/slideLayout1.xml");
        rels.add(IMAGE_REL, "../media/image1.png");
        rels.add(IMAGE_REL, "../media/image2.png");
        rels.items.push(Relationship {
            id: "rId4".into(),
            rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink".into(),
            target: "https://example.com/".into(),
            external: true,
        });
        rels.add(NOTES_SLIDE_REL, "../notesSlides/notesSlide1.xml");
        package.set_relationships("ppt/slides/slide1.xml", &rels);
        package
    }

    fn destination() -> Package {
        let mut package = Package::new();
        package.set_part("ppt/slides/slide1.xml", b"<p:sld/>".to_vec());
        package.set_part("ppt/media/image1.png", vec![9, 9, 9]);
        package
    }

    #[test]
    fn test_copied_slide_resolves_to_copied_images() {
        let source = source();
        let mut dest = destination();
        let mut copier = PartCopier::new(&source);

        let slide = copier.copy_part("ppt/slides/slide1.xml", &mut dest).unwrap();
        assert_eq!(slide, "ppt/slides/slide2.xml");
        assert_eq!(dest.content_type(&slide), Some(SLIDE_CT));

        let rels = dest.relationships(&slide).unwrap();
        let doc = dest.xml_part(&slide).unwrap();
        let embeds: Vec<&str> = doc.root.descendants().filter_map(|el| el.attr("r:embed")).collect();
        assert_eq!(embeds.len(), 2);

        for (embed, expected) in embeds.iter().zip([vec![2, 2, 2], vec![1, 1, 1]]) {
            let rel = rels.get(embed).unwrap();
            let target = resolve_target(&slide, &rel.target);
            assert_eq!(dest.part(&target).unwrap(), expected.as_slice());
        }
        // the pre-existing image is untouched
        assert_eq!(dest.part("ppt/media/image1.png").unwrap(), &[9, 9, 9]);
        assert_eq!(dest.content_type("ppt/media/image2.png"), Some("image/png"));
    }

    #[test]
    fn test_notes_are_dropped_and_external_links_kept() {
        let source = source();
        let mut dest = destination();
        let mut copier = PartCopier::new(&source);
        let slide = copier.copy_part("ppt/slides/slide1.xml", &mut dest).unwrap();

        let rels = dest.relationships(&slide).unwrap();
        assert_eq!(rels.items.len(), 4);
        assert!(rels.of_type(NOTES_SLIDE_REL).next().is_none());

        let doc = dest.xml_part(&slide).unwrap();
        let link = doc.root.find("a:hlinkClick").unwrap().attr("r:id").unwrap();
        let rel = rels.get(link).unwrap();
        assert!(rel.external);
        assert_eq!(rel.target, "https://example.com/");
    }

    #[test]
    fn test_each_part_is_copied_once() {
        let source = source();
        let mut dest = destination();
        let mut copier = PartCopier::new(&source);
        let first = copier.copy_part("ppt/media/image2.png", &mut dest).unwrap();
        copier.copy_part("ppt/slides/slide1.xml", &mut dest).unwrap();
        assert_eq!(copier.destination_of("ppt/media/image2.png"), Some(first.as_str()));
        assert_eq!(dest.part_names().filter(|n| n.starts_with("ppt/media/")).count(), 3);
    }

    #[test]
    fn test_seeded_part_is_not_copied() {
        let source = source();
        let mut dest = destination();
        dest.set_part("ppt/slideLayouts/slideLayout4.xml", b"<p:sldLayout/>".to_vec());
        let mut copier = PartCopier::new(&source);
        copier.seed("ppt/slideLayouts/slideLayout1.xml", "ppt/slideLayouts/slideLayout4.xml");

        let slide = copier.copy_part("ppt/slides/slide1.xml", &mut dest).unwrap();
        let rels = dest.relationships(&slide).unwrap();
        let layout = rels.of_type(SLIDE_LAYOUT_REL).next().unwrap();
        assert_eq!(layout.target, "../slideLayouts/slideLayout4.xml");
        assert!(!dest.contains("ppt/slideLayouts/slideLayout1.xml"));
    }

    #[test]
    fn test_rel_id_map_applies_in_one_pass() {
        let mut doc = XmlDocument::parse(SLIDE.as_bytes()).unwrap();
        let mut map = RelIdMap::default();
        map.insert("rId2", "rId3");
        map.insert("rId3", "rId7");
        assert_eq!(map.apply(&mut doc.root, "r"), 2);
        let embeds: Vec<&str> = doc.root.descendants().filter_map(|el| el.attr("r:embed")).collect();
        assert_eq!(embeds, vec!["rId7", "rId3"]);
    }
}
